//! Background CSV sink, run on a blocking task so the async collect loop
//! never waits on disk I/O directly.

use std::{
    collections::HashMap,
    fs::{self, File},
    path::{Path, PathBuf},
    time::Duration,
};

use config::{StreamWriterConfig, StreamWriterLayout};
use model::ArtifactId;
use serde::Serialize;
use tokio::task::JoinHandle;

/// Errors raised constructing or driving a [`StreamWriter`].
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// [`StreamWriterLayout::SingleFile`] requires a path ending in `.csv`.
    #[error("single-file stream writer path must end in .csv (got {path})")]
    NotACsvPath {
        /// The offending path.
        path: String,
    },

    /// [`StreamWriterLayout::PerArtifact`] requires an empty root directory.
    #[error("stream writer root directory is not empty: {path}")]
    RootNotEmpty {
        /// The offending path.
        path: String,
    },

    /// The writer's background task has already stopped.
    #[error("stream writer has stopped, row not delivered")]
    Closed,

    /// An I/O or CSV-encoding error occurred opening or writing a file.
    #[error("stream writer I/O error: {0}")]
    Io(#[from] std::io::Error),
}

enum Command<Row> {
    Write { artifact_id: ArtifactId, row: Row },
    Stop,
}

/// Background sink accepting `(artifact_id, row)` pairs and writing them to
/// one shared CSV file or one CSV file per artifact.
pub struct StreamWriter<Row> {
    sender: flume::Sender<Command<Row>>,
    task: JoinHandle<()>,
    flush_delay: Duration,
}

impl<Row> StreamWriter<Row>
where
    Row: Serialize + Send + 'static,
{
    /// Validates `config` and spawns the background writer task. Fails
    /// eagerly: a bad single-file extension or a non-empty per-artifact
    /// root directory is reported here, not on the first `write`.
    pub fn spawn(config: StreamWriterConfig) -> Result<Self, Error> {
        let layout = config.layout;
        let path = PathBuf::from(&config.path);

        match layout {
            StreamWriterLayout::SingleFile => {
                if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
                    return Err(Error::NotACsvPath { path: config.path });
                }
            }
            StreamWriterLayout::PerArtifact => {
                if path.exists() && fs::read_dir(&path)?.next().is_some() {
                    return Err(Error::RootNotEmpty { path: config.path });
                }
                fs::create_dir_all(&path)?;
            }
        }

        let (sender, receiver) = flume::bounded(256);
        let task = tokio::task::spawn_blocking(move || run_blocking(layout, path, receiver));

        Ok(Self {
            sender,
            task,
            flush_delay: Duration::from_secs(config.flush_delay_secs),
        })
    }

    /// Queues one row for `artifact_id`. Backpressures (rather than spins)
    /// once the internal queue is full.
    pub async fn write(&self, artifact_id: ArtifactId, row: Row) -> Result<(), Error> {
        self.sender
            .send_async(Command::Write { artifact_id, row })
            .await
            .map_err(|_| Error::Closed)
    }

    /// Waits `flush_delay_secs` for in-flight writes to arrive, then signals
    /// the background task to drain the queue best-effort, flush, and close
    /// every open file.
    pub async fn flush_and_close(self) {
        tokio::time::sleep(self.flush_delay).await;
        let _ = self.sender.send_async(Command::Stop).await;
        let _ = self.task.await;
    }
}

fn run_blocking<Row: Serialize>(layout: StreamWriterLayout, path: PathBuf, receiver: flume::Receiver<Command<Row>>) {
    let mut writers = Writers::new(layout, path);

    while let Ok(command) = receiver.recv() {
        match command {
            Command::Write { artifact_id, row } => writers.write(artifact_id, &row),
            Command::Stop => break,
        }
    }

    // Best-effort drain of whatever piled up between the stop signal being
    // sent and this task noticing it.
    while let Ok(Command::Write { artifact_id, row }) = receiver.try_recv() {
        writers.write(artifact_id, &row);
    }

    writers.flush_and_close();
}

enum Writers {
    SingleFile { root: PathBuf, writer: Option<csv::Writer<File>> },
    PerArtifact { root: PathBuf, writers: HashMap<ArtifactId, csv::Writer<File>> },
}

impl Writers {
    fn new(layout: StreamWriterLayout, path: PathBuf) -> Self {
        match layout {
            StreamWriterLayout::SingleFile => Writers::SingleFile { root: path, writer: None },
            StreamWriterLayout::PerArtifact => Writers::PerArtifact {
                root: path,
                writers: HashMap::new(),
            },
        }
    }

    fn write<Row: Serialize>(&mut self, artifact_id: ArtifactId, row: &Row) {
        match self {
            Writers::SingleFile { root, writer } => {
                if writer.is_none() {
                    match open_writer(root) {
                        Ok(opened) => *writer = Some(opened),
                        Err(error) => {
                            tracing::warn!(%error, "failed to open single-file csv writer");
                            return;
                        }
                    }
                }
                if let Err(error) = writer.as_mut().expect("just opened above").serialize(row) {
                    tracing::warn!(%error, "failed to write row to single-file stream");
                }
            }
            Writers::PerArtifact { root, writers } => {
                if !writers.contains_key(&artifact_id) {
                    let file_path = root.join(format!("patient_{artifact_id}.csv"));
                    match open_writer(&file_path) {
                        Ok(opened) => {
                            let _ = writers.insert(artifact_id, opened);
                        }
                        Err(error) => {
                            tracing::warn!(%error, %artifact_id, "failed to open per-artifact csv writer");
                            return;
                        }
                    }
                }
                let writer = writers.get_mut(&artifact_id).expect("just opened above");
                if let Err(error) = writer.serialize(row) {
                    tracing::warn!(%error, %artifact_id, "failed to write row to per-artifact stream");
                }
            }
        }
    }

    fn flush_and_close(self) {
        match self {
            Writers::SingleFile { writer: Some(mut writer), .. } => {
                let _ = writer.flush();
            }
            Writers::SingleFile { writer: None, .. } => {}
            Writers::PerArtifact { writers, .. } => {
                for (_, mut writer) in writers {
                    let _ = writer.flush();
                }
            }
        }
    }
}

fn open_writer(path: &Path) -> Result<csv::Writer<File>, Error> {
    let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    Ok(csv::WriterBuilder::new().has_headers(false).from_writer(file))
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        value: u32,
    }

    #[tokio::test]
    async fn single_file_writes_are_flushed_on_close() {
        let dir = tempdir();
        let path = dir.join("out.csv");
        let writer = StreamWriter::spawn(StreamWriterConfig {
            layout: StreamWriterLayout::SingleFile,
            path: path.to_string_lossy().into_owned(),
            flush_delay_secs: 0,
        })
        .unwrap();

        writer.write(ArtifactId(1), Row { value: 42 }).await.unwrap();
        writer.flush_and_close().await;

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("42"));
    }

    #[tokio::test]
    async fn per_artifact_rejects_non_empty_root() {
        let dir = tempdir();
        fs::write(dir.join("stale.csv"), "x").unwrap();

        let result = StreamWriter::<Row>::spawn(StreamWriterConfig {
            layout: StreamWriterLayout::PerArtifact,
            path: dir.to_string_lossy().into_owned(),
            flush_delay_secs: 0,
        });

        assert!(matches!(result, Err(Error::RootNotEmpty { .. })));
    }

    fn tempdir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gleaner-stream-writer-test-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }
}
