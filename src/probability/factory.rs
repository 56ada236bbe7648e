use std::collections::HashMap;
use std::sync::Arc;

use super::{
    BaseballModel, BasketballModel, FootballModel, ProbabilityError, WinProbabilityModel,
    WinProbabilityResult,
};
use crate::game::{GameState, Sport};

/// Registry of win probability models keyed by sport.
///
/// Adding a sport means registering another [`WinProbabilityModel`]; nothing
/// here switches on sport names.
#[derive(Clone, Default)]
pub struct ModelFactory {
    models: HashMap<Sport, Arc<dyn WinProbabilityModel>>,
}

impl ModelFactory {
    /// Factory with no models registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Football, basketball and baseball.
    pub fn with_default_models() -> Self {
        let mut factory = Self::empty();
        factory.register(Arc::new(FootballModel));
        factory.register(Arc::new(BasketballModel));
        factory.register(Arc::new(BaseballModel));
        factory
    }

    /// Register (or replace) the model for its sport.
    pub fn register(&mut self, model: Arc<dyn WinProbabilityModel>) {
        self.models.insert(model.sport(), model);
    }

    pub fn model_for(&self, sport: Sport) -> Result<Arc<dyn WinProbabilityModel>, ProbabilityError> {
        self.models
            .get(&sport)
            .cloned()
            .ok_or_else(|| ProbabilityError::UnsupportedSport(sport.to_string()))
    }

    /// Resolve a free-form sport tag such as `"nfl"` or `"baseball"`.
    pub fn model_for_tag(&self, tag: &str) -> Result<Arc<dyn WinProbabilityModel>, ProbabilityError> {
        let sport: Sport = tag.parse()?;
        self.model_for(sport)
    }

    pub fn calculate(&self, state: &GameState) -> Result<WinProbabilityResult, ProbabilityError> {
        Ok(self.model_for(state.sport())?.calculate(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::models::fixtures;
    use crate::game::InningHalf;

    #[test]
    fn test_default_models_cover_all_sports() {
        let factory = ModelFactory::with_default_models();
        for sport in [Sport::Football, Sport::Basketball, Sport::Baseball] {
            assert_eq!(factory.model_for(sport).unwrap().sport(), sport);
        }
    }

    #[test]
    fn test_unregistered_sport_is_rejected() {
        let mut factory = ModelFactory::empty();
        factory.register(Arc::new(FootballModel));
        let err = factory.model_for(Sport::Baseball).err().unwrap();
        assert_eq!(err, ProbabilityError::UnsupportedSport("baseball".into()));

        let g = fixtures::baseball(1, 0, 3, InningHalf::Top, 0, [false; 3]);
        assert!(factory.calculate(&g).is_err());
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let factory = ModelFactory::with_default_models();
        assert!(factory.model_for_tag("MLB").is_ok());
        assert_eq!(
            factory.model_for_tag("lacrosse").err().unwrap(),
            ProbabilityError::UnsupportedSport("lacrosse".into())
        );
    }

    #[test]
    fn test_calculate_dispatches_on_state_sport() {
        let factory = ModelFactory::with_default_models();
        let g = fixtures::basketball(50, 40, 2, 600);
        let r = factory.calculate(&g).unwrap();
        assert!(r.factors.contains_key("remaining_possessions"));
        assert!(r.home_win_probability > 0.9);
    }
}
