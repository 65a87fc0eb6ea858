pub mod pullback_service;

pub use pullback_service::{DashboardData, DashboardRow, PullbackService};
