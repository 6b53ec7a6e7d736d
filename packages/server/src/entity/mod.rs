pub mod challenge;
pub mod cheat_info;
pub mod container;
pub mod flag;
pub mod game;
pub mod game_instance;
pub mod member;
pub mod participation;
pub mod submission;
pub mod team;
