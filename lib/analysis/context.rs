//! State shared by all layers of one analysis run.

use log::warn;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;

pub type ThreadId = usize;
pub type StateId = usize;

/// Hands out increasing ids, starting at zero.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: Cell<usize>,
}

impl IdAllocator {
    pub fn new() -> IdAllocator {
        IdAllocator::default()
    }

    pub fn allocate(&self) -> usize {
        let id = self.next.get();
        self.next.set(id + 1);
        id
    }

    /// The number of ids handed out so far.
    pub fn allocated(&self) -> usize {
        self.next.get()
    }
}

/// A construct the analysis models unsoundly. A verdict reached while a
/// caveat was recorded only holds under that caveat.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum SoundnessCaveat {
    /// More than one program thread exists, but threads are never preempted
    /// when they exhaust their work-time budget.
    WorkTimeBudgetIgnored,
    /// A `waitUntil` was modelled as a plain yield.
    ApproximateWaitUntil,
    /// A `waitSecs` was modelled as a plain yield.
    WaitSecsIgnored,
}

impl fmt::Display for SoundnessCaveat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SoundnessCaveat::WorkTimeBudgetIgnored => {
                write!(f, "preemption on exhausted work-time budget is not modelled")
            }
            SoundnessCaveat::ApproximateWaitUntil => {
                write!(f, "wait until is modelled as a yield")
            }
            SoundnessCaveat::WaitSecsIgnored => write!(f, "wait seconds is modelled as a yield"),
        }
    }
}

/// Id allocators and collected caveats of one analysis run.
#[derive(Debug, Default)]
pub struct AnalysisContext {
    thread_ids: IdAllocator,
    state_ids: IdAllocator,
    big_steps: IdAllocator,
    caveats: RefCell<BTreeSet<SoundnessCaveat>>,
}

impl AnalysisContext {
    pub fn new() -> AnalysisContext {
        AnalysisContext::default()
    }

    pub fn thread_ids(&self) -> &IdAllocator {
        &self.thread_ids
    }

    pub fn state_ids(&self) -> &IdAllocator {
        &self.state_ids
    }

    pub fn big_steps(&self) -> &IdAllocator {
        &self.big_steps
    }

    pub fn report_caveat(&self, caveat: SoundnessCaveat) {
        if self.caveats.borrow_mut().insert(caveat) {
            warn!("Soundness caveat: {}", caveat);
        }
    }

    pub fn caveats(&self) -> BTreeSet<SoundnessCaveat> {
        self.caveats.borrow().clone()
    }
}
