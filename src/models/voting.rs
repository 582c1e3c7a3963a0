//! Equal-weight averaging ensemble.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::AppError;
use crate::models::regressor::Regressor;

pub struct VotingRegressor {
    members: Vec<Box<dyn Regressor>>,
}

impl VotingRegressor {
    pub fn new(members: Vec<Box<dyn Regressor>>) -> Self {
        Self { members }
    }

    pub fn member_names(&self) -> Vec<&'static str> {
        self.members.iter().map(|m| m.name()).collect()
    }
}

impl Regressor for VotingRegressor {
    fn name(&self) -> &'static str {
        "VotingRegressor"
    }

    fn fit(&mut self, x: &DMatrix<f64>, y: &DVector<f64>) -> Result<(), AppError> {
        if self.members.is_empty() {
            return Err(AppError::new(2, "VotingRegressor needs at least one member."));
        }
        for member in &mut self.members {
            member.fit(x, y)?;
            debug!(member = member.name(), "ensemble member fitted");
        }
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        let total: f64 = self.members.iter().map(|m| m.predict_row(row)).sum();
        total / self.members.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BayesianRidge, LinearSvr, Ridge};

    #[test]
    fn averages_member_predictions() {
        let x = DMatrix::from_row_slice(4, 1, &[0.0, 1.0, 2.0, 3.0]);
        let y = DVector::from_row_slice(&[1.0, 3.0, 5.0, 7.0]);

        let mut ridge = Ridge::default();
        let mut bayes = BayesianRidge::new();
        ridge.fit(&x, &y).unwrap();
        bayes.fit(&x, &y).unwrap();

        let mut vote = VotingRegressor::new(vec![Box::new(Ridge::default()), Box::new(BayesianRidge::new())]);
        vote.fit(&x, &y).unwrap();
        let want = (ridge.predict_row(&[1.5]) + bayes.predict_row(&[1.5])) / 2.0;
        assert!((vote.predict_row(&[1.5]) - want).abs() < 1e-12);
        assert_eq!(vote.member_names(), vec!["Ridge", "BayesianRidge"]);

        let three = VotingRegressor::new(vec![
            Box::new(BayesianRidge::new()),
            Box::new(LinearSvr::new(1984)),
            Box::new(Ridge::default()),
        ]);
        assert_eq!(three.member_names().len(), 3);
    }
}
