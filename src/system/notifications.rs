// src/system/notifications.rs

//! Change notifications from the outside world.
//!
//! Watchers and host callbacks may run on any thread. They only hold a `ChangeSender`; the
//! thread that owns the tree drains the queue and applies the changes itself.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use uuid::Uuid;

/// Something outside the tree changed. Carries no content; the receiver re-reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceChange {
    /// A per-project file changed (or appeared, or vanished).
    ProjectFile {
        /// The project the file belongs to.
        project: Uuid,
        /// The file that changed.
        path: PathBuf,
    },
    /// The solution-wide file changed.
    SolutionFile {
        /// The file that changed.
        path: PathBuf,
    },
    /// A settings file changed.
    Settings,
    /// A project was loaded into the solution.
    ProjectAdded {
        /// The new project.
        project: Uuid,
    },
    /// A project was unloaded.
    ProjectRemoved {
        /// The unloaded project.
        project: Uuid,
    },
    /// A project was renamed to `new_name`.
    ProjectRenamed {
        /// The renamed project.
        project: Uuid,
        /// Its name from now on.
        new_name: String,
    },
    /// The set of startup projects changed.
    StartupProjectsChanged {
        /// Every startup project after the change.
        projects: Vec<Uuid>,
    },
}

/// Cloneable handle for producers.
#[derive(Debug, Clone)]
pub struct ChangeSender {
    tx: Sender<SourceChange>,
}

impl ChangeSender {
    /// Queues a change. Returns `false` if the receiving side is gone.
    pub fn notify(&self, change: SourceChange) -> bool {
        self.tx.send(change).is_ok()
    }
}

/// The consumer side, owned by the tree's thread.
#[derive(Debug)]
pub struct ChangeQueue {
    tx: Sender<SourceChange>,
    rx: Receiver<SourceChange>,
}

impl Default for ChangeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeQueue {
    /// A new, empty queue.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    /// A handle producers on any thread can send through.
    pub fn sender(&self) -> ChangeSender {
        ChangeSender {
            tx: self.tx.clone(),
        }
    }

    /// Takes every queued change. A change sent more than once keeps only its last
    /// occurrence, so the order in which changes take effect is the order they were last sent.
    pub fn drain(&self) -> Vec<SourceChange> {
        let received: Vec<SourceChange> = self.rx.try_iter().collect();
        let mut seen: HashSet<&SourceChange> = HashSet::with_capacity(received.len());
        let mut changes: Vec<SourceChange> = received
            .iter()
            .rev()
            .filter(|change| seen.insert(*change))
            .cloned()
            .collect();
        changes.reverse();
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_changes_from_other_threads_are_drained_once() {
        let queue = ChangeQueue::new();
        let project = Uuid::new_v4();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sender = queue.sender();
                thread::spawn(move || {
                    sender.notify(SourceChange::ProjectAdded { project });
                    sender.notify(SourceChange::Settings);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(drained.contains(&SourceChange::Settings));
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_interleaved_repeats_keep_their_last_position() {
        let queue = ChangeQueue::new();
        let sender = queue.sender();
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let startup = |project| SourceChange::StartupProjectsChanged {
            projects: vec![project],
        };
        sender.notify(startup(a));
        sender.notify(SourceChange::Settings);
        sender.notify(startup(b));
        sender.notify(startup(a));

        assert_eq!(
            queue.drain(),
            vec![SourceChange::Settings, startup(b), startup(a)]
        );
    }
}
