use crate::error::{EvalError, Result};
use crate::models::Interaction;

/// Checks a raw row before it becomes an [`Interaction`].
pub fn validate_raw_row(row: usize, user_id: i64, item_id: i64, rating: f64) -> Result<Interaction> {
    if user_id < 0 {
        return Err(EvalError::malformed(row, format!("negative user id {}", user_id)));
    }

    if item_id < 0 {
        return Err(EvalError::malformed(row, format!("negative item id {}", item_id)));
    }

    if !rating.is_finite() {
        return Err(EvalError::malformed(row, "rating is NaN or infinite"));
    }

    let rating = rating as f32;
    if !rating.is_finite() {
        return Err(EvalError::malformed(row, "rating overflows f32"));
    }

    Ok(Interaction::new(user_id as usize, item_id as usize, rating))
}

pub fn validate_interaction(row: usize, interaction: &Interaction) -> Result<()> {
    if !interaction.rating.is_finite() {
        return Err(EvalError::malformed(row, "rating is NaN or infinite"));
    }
    Ok(())
}

pub fn validate_interactions(interactions: &[Interaction]) -> Result<()> {
    interactions
        .iter()
        .enumerate()
        .try_for_each(|(row, interaction)| validate_interaction(row, interaction))
}

pub fn validate_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(EvalError::Configuration("k must be at least 1".to_string()));
    }
    Ok(())
}
