mod availability;
mod map;

pub use self::{availability::query, map::map};
