pub mod game;
pub mod jwt;
