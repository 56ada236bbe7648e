pub mod models;

pub use models::{
    BaseballState, BasketballState, FootballState, GameState, InningHalf, Lead, Side, Sport,
    SportState, Team,
};
