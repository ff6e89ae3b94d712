pub mod check;
pub mod guard;
pub mod rules;
