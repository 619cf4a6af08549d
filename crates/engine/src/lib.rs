#![deny(
    trivial_numeric_casts,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    unused_results
)]
#![warn(unreachable_pub)]

//! The engine owns the working set: it admits artifacts up to the
//! configured capacity, runs a `HeavyLoader`/`FineSampler` pair for each,
//! merges their output into one bounded queue, and periodically asks a
//! [`scheduler::Scheduler`] whether to evict one artifact in favor of
//! another. It runs as a single background task; callers only ever see the
//! [`EngineHandle`] returned by [`start`].

mod working_set;
mod worker;

use std::{sync::Arc, time::Duration};

use config::EngineConfig;
use control::{ControlReceiver, ControlSignal, LastValue};
use model::{ArtifactId, Dataset, FineSample, Marker};
use sampler::Sampling;
use scheduler::{Decision, Scheduler};
use task::TaskManager;

use crate::working_set::{WorkingSet, WorkingSetView};

/// Errors surfaced by the engine's consumer API.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The engine's background task has already stopped; the command (or
    /// message) it was sent to could not be delivered.
    #[error("engine has stopped, command not delivered")]
    Stopped,
}

/// A command sent from an [`EngineHandle`] to the engine's background task.
#[derive(Debug)]
enum EngineCommand<Msg> {
    /// Route `message` to the named artifact's `FineSampler`, if it is
    /// currently loaded. Delivered as last-value-wins: an undelivered
    /// message is replaced, not queued.
    SendMessage { artifact_id: ArtifactId, message: Msg },
    /// Stop admitting new artifacts; let the working set drain naturally.
    Pause,
}

/// Consumer-facing handle to a running engine. Cloning is cheap; every
/// clone talks to the same background task.
pub struct EngineHandle<S: Sampling> {
    output: flume::Receiver<FineSample<S::Payload, S::FineInfo, S::HeavyInfo>>,
    commands: flume::Sender<Vec<EngineCommand<S::Message>>>,
    done: LastValue<Marker>,
}

impl<S: Sampling> Clone for EngineHandle<S> {
    fn clone(&self) -> Self {
        Self {
            output: self.output.clone(),
            commands: self.commands.clone(),
            done: self.done.clone(),
        }
    }
}

impl<S: Sampling> EngineHandle<S> {
    /// Waits for the next fine sample. Returns `Err` with [`Marker::Halt`]
    /// or [`Marker::EndOfStream`] once the engine has wound down and every
    /// buffered sample has been delivered.
    pub async fn get(&self) -> Result<FineSample<S::Payload, S::FineInfo, S::HeavyInfo>, Marker> {
        match self.output.recv_async().await {
            Ok(sample) => Ok(sample),
            Err(_) => Err(self.done.get().unwrap_or(Marker::EndOfStream)),
        }
    }

    /// Routes `message` to `artifact_id`'s sampler, if it is currently
    /// loaded. Silently has no effect if the artifact is not loaded, or is
    /// evicted before the sampler next reads it.
    pub fn send_message(&self, artifact_id: ArtifactId, message: S::Message) -> Result<(), Error> {
        self.commands
            .try_send(vec![EngineCommand::SendMessage { artifact_id, message }])
            .map_err(|_| Error::Stopped)
    }

    /// Stops admitting new artifacts. Artifacts already loaded keep
    /// streaming until drained; once every loaded artifact has drained, the
    /// engine stops and `get()` starts returning `Err(Marker::Halt)`.
    pub fn pause(&self) -> Result<(), Error> {
        self.commands.try_send(vec![EngineCommand::Pause]).map_err(|_| Error::Stopped)
    }

    /// Returns true while the engine's background task is still running.
    pub fn running(&self) -> bool {
        self.done.get().is_none()
    }
}

/// Starts the engine: admits an initial working set out of `dataset`
/// (chosen by `scheduler`), and spawns the background task that streams
/// samples and periodically reschedules. Tasks are registered with
/// `task_manager` so a caller can `task_manager.join().await` for a clean
/// shutdown.
pub fn start<S, Sch>(
    sampling: Arc<S>,
    scheduler: Sch,
    dataset: Dataset<S::Record>,
    config: EngineConfig,
    task_manager: TaskManager,
) -> EngineHandle<S>
where
    S: Sampling,
    S::Record: Clone,
    Sch: Scheduler<ArtifactId> + 'static,
{
    let (output_tx, output_rx) = flume::bounded(config.output_queue_capacity);
    let (commands_tx, commands_rx) = flume::bounded(64);
    let done = LastValue::new();

    let handle = EngineHandle {
        output: output_rx,
        commands: commands_tx,
        done: done.clone(),
    };

    // `task_manager` tracks the heavy-loader/fine-sampler tasks spawned
    // while this run is active. The main loop below joins it once the
    // working set is empty; it is deliberately not registered with itself
    // (that would have the loop awaiting its own completion).
    let _background = tokio::spawn(run(sampling, scheduler, dataset, config, task_manager, output_tx, commands_rx, done));

    handle
}

async fn run<S, Sch>(
    sampling: Arc<S>,
    scheduler: Sch,
    dataset: Dataset<S::Record>,
    config: EngineConfig,
    mut task_manager: TaskManager,
    output_tx: flume::Sender<FineSample<S::Payload, S::FineInfo, S::HeavyInfo>>,
    commands_rx: flume::Receiver<Vec<EngineCommand<S::Message>>>,
    done: LastValue<Marker>,
) where
    S: Sampling,
    S::Record: Clone,
    Sch: Scheduler<ArtifactId>,
{
    let all_ids = dataset.ids();
    let initial = scheduler.initial_schedule(&all_ids, config.working_set_capacity);
    let waiting = all_ids.into_iter().filter(|id| !initial.contains(id)).collect();

    let mut working_set: WorkingSet<S> = WorkingSet::new(waiting);
    for id in initial {
        admit_artifact(&sampling, &dataset, id, None, None, &config, &mut task_manager, &output_tx, &mut working_set);
    }

    let mut paused = false;
    let mut halted = false;
    let mut signals = ControlReceiver::with_interval(commands_rx, Duration::from_millis(config.reschedule_interval_ms));

    loop {
        match signals.recv().await {
            ControlSignal::Tick { .. } => {
                reap_exhausted(&mut working_set);

                if !paused && !halted {
                    let decision = scheduler.schedule(&WorkingSetView::new(&working_set));
                    match decision {
                        Decision::Reschedule { evict, admit } => {
                            reschedule(&sampling, &dataset, evict, admit, &config, &mut task_manager, &output_tx, &mut working_set);
                        }
                        Decision::Skip => {}
                        Decision::Halt => halted = true,
                    }
                }
            }
            ControlSignal::Messages { messages } => {
                for command in messages {
                    match command {
                        EngineCommand::SendMessage { artifact_id, message } => {
                            if config.enable_messages {
                                if let Some(entry) = working_set.loaded.get(&artifact_id) {
                                    entry.message.set(message);
                                }
                            }
                        }
                        EngineCommand::Pause => paused = true,
                    }
                }
            }
            ControlSignal::Stop => break,
        }

        reap_exhausted(&mut working_set);

        if halted {
            break;
        }
        if paused && working_set.loaded.is_empty() {
            break;
        }
        if working_set.is_finished() {
            break;
        }
    }

    for (_, entry) in working_set.loaded.drain() {
        entry.forwarder.abort();
    }

    done.set(if halted { Marker::Halt } else { Marker::EndOfStream });
    task_manager.join().await;
}

#[allow(clippy::too_many_arguments)]
fn admit_artifact<S>(
    sampling: &Arc<S>,
    dataset: &Dataset<S::Record>,
    id: ArtifactId,
    resume_from: Option<S::Checkpoint>,
    resume_message: Option<S::Message>,
    config: &EngineConfig,
    task_manager: &mut TaskManager,
    output_tx: &flume::Sender<FineSample<S::Payload, S::FineInfo, S::HeavyInfo>>,
    working_set: &mut WorkingSet<S>,
) where
    S: Sampling,
    S::Record: Clone,
{
    let Some(artifact) = dataset.get(id) else {
        tracing::warn!(artifact_id = %id, "scheduler admitted an id not present in the dataset");
        return;
    };
    let entry = worker::admit(
        sampling.clone(),
        artifact.clone(),
        resume_from,
        resume_message,
        config,
        task_manager,
        output_tx.clone(),
    );
    working_set.loaded.insert(id, entry);
    working_set.record_admission(id);
}

#[allow(clippy::too_many_arguments)]
fn reschedule<S>(
    sampling: &Arc<S>,
    dataset: &Dataset<S::Record>,
    evict_id: ArtifactId,
    admit_id: ArtifactId,
    config: &EngineConfig,
    task_manager: &mut TaskManager,
    output_tx: &flume::Sender<FineSample<S::Payload, S::FineInfo, S::HeavyInfo>>,
    working_set: &mut WorkingSet<S>,
) where
    S: Sampling,
    S::Record: Clone,
{
    if let Some(entry) = working_set.loaded.remove(&evict_id) {
        let still_has_work = !worker::is_exhausted(&entry.status);
        let (checkpoint, message) = worker::evict(entry, config.grab_on_evict, output_tx);
        if still_has_work {
            if config.enable_checkpoints {
                if let Some(checkpoint) = checkpoint {
                    working_set.preserved_checkpoints.insert(evict_id, checkpoint);
                }
            }
            if config.enable_messages {
                if let Some(message) = message {
                    working_set.preserved_messages.insert(evict_id, message);
                }
            }
            working_set.waiting.push(evict_id);
        }
    }

    working_set.waiting.retain(|&id| id != admit_id);
    let resume_from = if config.enable_checkpoints {
        working_set.preserved_checkpoints.remove(&admit_id)
    } else {
        None
    };
    let resume_message = if config.enable_messages {
        working_set.preserved_messages.remove(&admit_id)
    } else {
        None
    };
    admit_artifact(
        sampling,
        dataset,
        admit_id,
        resume_from,
        resume_message,
        config,
        task_manager,
        output_tx,
        working_set,
    );
}

/// Removes loaded artifacts whose sampler has fully terminated (its
/// forwarder task has already exited on its own): they have nothing left to
/// stream and must not be treated as eviction candidates or re-queued.
fn reap_exhausted<S: Sampling>(working_set: &mut WorkingSet<S>) {
    let finished: Vec<ArtifactId> = working_set
        .loaded
        .iter()
        .filter(|(_, entry)| entry.forwarder.is_finished())
        .map(|(id, _)| *id)
        .collect();

    for id in finished {
        if let Some(entry) = working_set.loaded.remove(&id) {
            entry.forwarder.abort();
        }
    }
}

