#![deny(clippy::print_stdout, clippy::print_stderr)]

//! Orchestration layer: the public contract for posting journals, reading
//! history, dispatching the outbox, and acknowledging events. Everything
//! here delegates to a [`ledger_store::LedgerStore`] and adds validation,
//! tracing, and the in-memory telemetry counters around it.

pub mod history;
pub mod ingress;
pub mod outbox;
pub mod poster;
pub mod telemetry;

pub use history::HistoryReader;
pub use ingress::EventIngress;
pub use outbox::{OutboxDispatcher, ProcessOnceOptions, backoff_delay};
pub use poster::JournalPoster;
pub use telemetry::{LedgerTelemetry, TelemetryCounters};
