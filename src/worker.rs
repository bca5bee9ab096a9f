use std::collections::BTreeMap;
use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};
use eframe::egui;

use crate::data::classify::GroupKey;
use crate::data::error::DataError;
use crate::data::insights::CohortData;
use crate::data::model::{Series, SubjectId, SubjectInfo};
use crate::state::PanelKind;

// ---------------------------------------------------------------------------
// Background loading
// ---------------------------------------------------------------------------

/// Result of a background load, delivered to the UI thread.
///
/// Every event carries the generation of the dataset it was read from, so
/// loads that finish after another folder was opened can be dropped.
#[derive(Debug)]
pub enum LoadEvent {
    Subjects {
        dataset: u64,
        result: Result<Vec<SubjectInfo>, DataError>,
    },
    Series {
        dataset: u64,
        panel: PanelKind,
        generation: u64,
        id: SubjectId,
        result: Result<Series, DataError>,
    },
    Groups {
        dataset: u64,
        panel: PanelKind,
        groups: BTreeMap<GroupKey, Series>,
    },
    Cohorts {
        dataset: u64,
        data: CohortData,
    },
}

impl LoadEvent {
    pub fn dataset(&self) -> u64 {
        match self {
            LoadEvent::Subjects { dataset, .. }
            | LoadEvent::Series { dataset, .. }
            | LoadEvent::Groups { dataset, .. }
            | LoadEvent::Cohorts { dataset, .. } => *dataset,
        }
    }
}

/// Runs file loading off the UI thread. Each job runs on its own thread and
/// posts exactly one [`LoadEvent`]; the UI drains them with [`Worker::drain`].
pub struct Worker {
    tx: Sender<LoadEvent>,
    rx: Receiver<LoadEvent>,
    ctx: Option<egui::Context>,
}

impl Default for Worker {
    fn default() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx, ctx: None }
    }
}

impl Worker {
    /// Wake the UI whenever a job finishes.
    pub fn set_context(&mut self, ctx: egui::Context) {
        self.ctx = Some(ctx);
    }

    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() -> LoadEvent + Send + 'static,
    {
        let tx = self.tx.clone();
        let ctx = self.ctx.clone();
        thread::spawn(move || {
            if tx.send(job()).is_err() {
                log::debug!("load finished after the viewer closed");
                return;
            }
            if let Some(ctx) = ctx {
                ctx.request_repaint();
            }
        });
    }

    /// Events that have arrived since the last call.
    pub fn drain(&self) -> Vec<LoadEvent> {
        self.rx.try_iter().collect()
    }

    /// Block until the next event. Used by tests.
    #[cfg(test)]
    pub fn recv(&self) -> Option<LoadEvent> {
        self.rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .ok()
    }
}
