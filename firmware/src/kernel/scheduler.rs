// Priority job queues for the polling loop
// No dynamic allocation; each priority has a fixed-capacity deque.
use core::fmt;

use heapless::Deque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    // drained first: IMU data-ready and the radio RX FIFO
    PollImu,
    PollRadio,

    PollAccel,
    PollAdc,
    PollUsbPd,

    ReportStatus,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::PollImu => write!(f, "PollImu"),
            Job::PollRadio => write!(f, "PollRadio"),
            Job::PollAccel => write!(f, "PollAccel"),
            Job::PollAdc => write!(f, "PollAdc"),
            Job::PollUsbPd => write!(f, "PollUsbPd"),
            Job::ReportStatus => write!(f, "ReportStatus"),
        }
    }
}

/// Job priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    High = 0,
    Normal = 1,
    Low = 2,
}

impl Job {
    pub const fn priority(&self) -> Priority {
        match self {
            Job::PollImu | Job::PollRadio => Priority::High,
            Job::PollAccel | Job::PollAdc | Job::PollUsbPd => Priority::Normal,
            Job::ReportStatus => Priority::Low,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PushError {
    /// Queue for this priority level is full, contains the rejected job
    Full(Job),
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Full(job) => write!(f, "queue full, rejected {}", job),
        }
    }
}

// Every job kind is polled at most once per wake, so these never fill
// when callers go through push_unique.
pub struct Scheduler {
    high: Deque<Job, 2>,
    normal: Deque<Job, 4>,
    low: Deque<Job, 2>,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            high: Deque::new(),
            normal: Deque::new(),
            low: Deque::new(),
        }
    }

    // Schedule a job only if it's not already queued (dedup that queue).
    pub fn push_unique(&mut self, job: Job) -> Result<(), PushError> {
        match job.priority() {
            Priority::High => enqueue_unique(&mut self.high, job),
            Priority::Normal => enqueue_unique(&mut self.normal, job),
            Priority::Low => enqueue_unique(&mut self.low, job),
        }
    }

    // the next job to execute
    pub fn pop(&mut self) -> Option<Job> {
        self.high
            .pop_front()
            .or_else(|| self.normal.pop_front())
            .or_else(|| self.low.pop_front())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn enqueue_unique<const N: usize>(queue: &mut Deque<Job, N>, job: Job) -> Result<(), PushError> {
    if queue.iter().any(|queued| *queued == job) {
        return Ok(());
    }
    queue.push_back(job).map_err(PushError::Full)
}
