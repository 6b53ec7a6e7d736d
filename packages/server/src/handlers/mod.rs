pub mod admin;
pub mod container;
pub mod game;
pub mod scoreboard;
pub mod submission;
