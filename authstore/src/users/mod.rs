//! Recipe-agnostic index of every auth user.

mod store;
mod types;

pub use store::UserStore;
pub use types::{AuthRecipeUser, RecipeId};
