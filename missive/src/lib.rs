pub mod controller;

pub use controller::{Missive, Service};
