use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::template::{LevelTemplate, TemplateError};

/// Produces templates by name. Implementations run on the loader's
/// worker thread and report progress through the supplied sink.
pub trait TemplateSource: Send + Sync + 'static {
    fn load(
        &self,
        name: &str,
        progress: &mut dyn FnMut(f64, f64),
    ) -> Result<LevelTemplate, TemplateError>;
}

/// Loader notification, delivered by polling on the caller's thread.
#[derive(Debug)]
pub enum LoadEvent {
    Started {
        slot: u32,
        name: String,
    },
    Progress {
        slot: u32,
        now: f64,
        total: f64,
    },
    Done {
        slot: u32,
        result: Result<Arc<LevelTemplate>, TemplateError>,
    },
}

struct Task {
    slot: u32,
    name: String,
}

struct State {
    pending: VecDeque<Task>,
    events: Vec<LoadEvent>,
    running: bool,
}

struct Shared {
    state: Mutex<State>,
    work: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind,
        // nothing an inconsistent invariant could hide in.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Background level loader.
///
/// One worker thread drains a task queue guarded by a mutex and a
/// condvar; results come back as [`LoadEvent`]s through [`poll`]. A
/// running simulation only ever sees a template through a completed
/// `Done` event, so stepping never races loading.
///
/// [`poll`]: LevelLoader::poll
pub struct LevelLoader {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl LevelLoader {
    pub fn new(source: Arc<dyn TemplateSource>) -> LevelLoader {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                pending: VecDeque::new(),
                events: Vec::new(),
                running: true,
            }),
            work: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("level-loader".into())
            .spawn(move || worker_main(worker_shared, source));
        match worker {
            Ok(worker) => LevelLoader {
                shared,
                worker: Some(worker),
            },
            Err(err) => {
                // Degenerate but survivable: requests queue up and
                // nothing answers them.
                warn!(%err, "failed to spawn loader thread");
                LevelLoader {
                    shared,
                    worker: None,
                }
            }
        }
    }

    /// Queue a load. A second request for a slot with a load still
    /// pending replaces it; a load already in flight is left to finish.
    pub fn request(&self, slot: u32, name: &str) {
        let mut state = self.shared.lock();
        if let Some(task) = state.pending.iter_mut().find(|t| t.slot == slot) {
            debug!(slot, name, replaced = %task.name, "replacing pending load");
            task.name = name.to_owned();
        } else {
            debug!(slot, name, "queueing load");
            state.pending.push_back(Task {
                slot,
                name: name.to_owned(),
            });
        }
        drop(state);
        self.shared.work.notify_one();
    }

    /// Take all events accumulated since the last poll.
    pub fn poll(&self) -> Vec<LoadEvent> {
        std::mem::take(&mut self.shared.lock().events)
    }
}

impl Drop for LevelLoader {
    fn drop(&mut self) {
        self.shared.lock().running = false;
        self.shared.work.notify_all();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("loader thread panicked");
        }
    }
}

fn worker_main(shared: Arc<Shared>, source: Arc<dyn TemplateSource>) {
    info!("level loader thread started");
    loop {
        let task = {
            let mut state = shared.lock();
            loop {
                if !state.running {
                    info!("level loader thread stopping");
                    return;
                }
                if let Some(task) = state.pending.pop_front() {
                    break task;
                }
                state = shared
                    .work
                    .wait(state)
                    .unwrap_or_else(|e| e.into_inner());
            }
        };

        debug!(slot = task.slot, name = %task.name, "loading template");
        shared.lock().events.push(LoadEvent::Started {
            slot: task.slot,
            name: task.name.clone(),
        });

        let mut progress = |now: f64, total: f64| {
            shared.lock().events.push(LoadEvent::Progress {
                slot: task.slot,
                now,
                total,
            });
        };
        let result = source.load(&task.name, &mut progress).map(Arc::new);

        if let Err(err) = &result {
            warn!(slot = task.slot, name = %task.name, %err, "template load failed");
        }
        shared.lock().events.push(LoadEvent::Done {
            slot: task.slot,
            result,
        });
    }
}
