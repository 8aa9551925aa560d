//! Studio Core Library
//!
//! Booking models, the approval workflow, conflict-aware allocation, split
//! booking composition, audit history, and storage for studio and academy
//! bookings.

pub mod allocation;
pub mod composer;
pub mod config;
pub mod error;
pub mod history;
pub mod invariants;
pub mod models;
pub mod notify;
pub mod service;
pub mod storage;
pub mod workflow;

pub use allocation::{Allocation, AllocationRequest, SlotAllocator};
pub use composer::{suggest_break, BookingComposer, BookingForm, ComposedBooking};
pub use config::{CatalogSeed, Config};
pub use error::{Error, Result};
pub use history::{AppendOutcome, ChangeRecord, ChangeSummary, HistoryRecorder};
pub use models::*;
pub use notify::{LogNotifier, Notifier, NoopNotifier};
pub use service::{ActionResponse, BookingOutcome, BookingService};
pub use storage::{
    BookingFilter, BookingRepository, CatalogRepository, Database, HistoryRepository, Page,
};
pub use workflow::{Action, StatusStateMachine, Transition};
