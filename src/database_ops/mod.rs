pub mod boxscores;
pub mod db;
pub mod game_stats;
pub mod teams;
