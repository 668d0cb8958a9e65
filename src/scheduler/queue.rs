use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, error::TrySendError};

use url::{Host, Url};

use crate::directory::UserDirectory;
use crate::error::AdmissionError;
use crate::scheduler::job::{JobState, JobTicket, ScoringJob};

/// Admission control in front of a bounded FIFO of scoring jobs.
///
/// A participant's in-flight marker is set before its job enters the queue
/// and cleared only by the worker that processed the job, so at most one
/// job per participant is queued or running at any time.
#[derive(Debug)]
pub struct AdmissionQueue {
    directory: Arc<UserDirectory>,
    allow_local_targets: bool,
    capacity: usize,
    in_flight: Mutex<HashMap<String, JobTicket>>,
    tx: mpsc::Sender<ScoringJob>,
    rx: tokio::sync::Mutex<mpsc::Receiver<ScoringJob>>,
}

impl AdmissionQueue {
    /// Create a queue holding at most `capacity` pending jobs.
    pub fn new(directory: Arc<UserDirectory>, capacity: usize, allow_local_targets: bool) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            directory,
            allow_local_targets,
            capacity,
            in_flight: Mutex::new(HashMap::new()),
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Validate and enqueue a job.
    ///
    /// Checks run in order: endpoint syntax, known participant, duplicate.
    /// Never blocks; a full queue is reported as [`AdmissionError::QueueFull`].
    pub fn submit(&self, job: ScoringJob) -> Result<JobTicket, AdmissionError> {
        validate_endpoint(&job.target_endpoint, self.allow_local_targets)?;

        let participant = self
            .directory
            .get(&job.participant_key)
            .ok_or_else(|| AdmissionError::UnknownParticipant(job.participant_key.clone()))?;

        let ticket = JobTicket {
            job_id: job.id,
            participant_key: job.participant_key.clone(),
            display_name: participant.display_name.clone(),
            submitted_at: job.submitted_at,
            state: JobState::Queued,
        };

        let mut in_flight = self.lock_in_flight();
        if in_flight.contains_key(&job.participant_key) {
            return Err(AdmissionError::AlreadyInQueue(job.participant_key));
        }
        in_flight.insert(job.participant_key.clone(), ticket.clone());

        let key = job.participant_key.clone();
        match self.tx.try_send(job) {
            Ok(()) => {
                tracing::info!(participant = %key, job_id = %ticket.job_id, "Job admitted");
                Ok(ticket)
            }
            Err(TrySendError::Full(_)) => {
                in_flight.remove(&key);
                tracing::warn!(participant = %key, capacity = self.capacity, "Job queue at capacity, job rejected");
                Err(AdmissionError::QueueFull(self.capacity))
            }
            Err(TrySendError::Closed(_)) => {
                in_flight.remove(&key);
                Err(AdmissionError::QueueClosed)
            }
        }
    }

    /// Wait for the next job in submission order and mark it running.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<ScoringJob> {
        let job = self.rx.lock().await.recv().await?;
        if let Some(ticket) = self.lock_in_flight().get_mut(&job.participant_key) {
            ticket.state = JobState::Running;
        }
        Some(job)
    }

    /// Clear the participant's in-flight marker. Returns false if it was not set.
    pub fn release(&self, participant_key: &str) -> bool {
        let removed = self.lock_in_flight().remove(participant_key).is_some();
        if removed {
            tracing::debug!(participant = %participant_key, "In-flight marker cleared");
        }
        removed
    }

    /// Marker that is released when dropped, even if the worker panics.
    pub fn guard(self: &Arc<Self>, participant_key: &str) -> InFlightGuard {
        InFlightGuard {
            queue: Arc::clone(self),
            participant_key: participant_key.to_string(),
        }
    }

    pub fn is_in_flight(&self, participant_key: &str) -> bool {
        self.lock_in_flight().contains_key(participant_key)
    }

    /// Jobs queued or running, oldest submission first.
    pub fn snapshot(&self) -> Vec<JobTicket> {
        let mut tickets: Vec<JobTicket> = self.lock_in_flight().values().cloned().collect();
        tickets.sort_by_key(|t| t.submitted_at);
        tickets
    }

    pub fn in_flight_count(&self) -> usize {
        self.lock_in_flight().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<String, JobTicket>> {
        // The map holds plain data; a panic mid-update cannot leave it inconsistent.
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clears a participant's in-flight marker on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    queue: Arc<AdmissionQueue>,
    participant_key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.queue.release(&self.participant_key);
    }
}

/// Syntactic check that `endpoint` is an absolute http(s) URL to a
/// non-local host.
pub fn validate_endpoint(endpoint: &str, allow_local: bool) -> Result<Url, AdmissionError> {
    let invalid = || AdmissionError::InvalidEndpoint(endpoint.to_string());

    let url = Url::parse(endpoint.trim()).map_err(|_| invalid())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid());
    }

    let host = url.host().ok_or_else(invalid)?;
    if !allow_local && is_local_host(&host) {
        return Err(invalid());
    }

    Ok(url)
}

fn is_local_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Host::Ipv4(ip) => ip.is_loopback() || ip.is_unspecified(),
        Host::Ipv6(ip) => {
            ip.is_loopback()
                || ip.is_unspecified()
                || ip
                    .to_ipv4_mapped()
                    .is_some_and(|v4| v4.is_loopback() || v4.is_unspecified())
        }
    }
}
