//! Service-marketplace booking backend: bookings with pricing and capacity
//! rules, recurring series, group bookings, waitlists, reminders,
//! notifications and reviews.

pub mod actor;
pub mod app;
pub mod bookings;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod db;
pub mod effects;
pub mod error;
pub mod groups;
pub mod jobs;
pub mod notifications;
pub mod recurring;
pub mod reminders;
pub mod reviews;
pub mod store;
pub mod waitlist;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod tests;
