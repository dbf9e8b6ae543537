pub mod contact;
pub mod marketier;
pub mod product;
pub mod product_owner;
pub mod proposal;
pub mod review;
pub mod token;
pub mod user;

use std::sync::Arc;

use crate::auth::tokens::TokenStore;
use crate::database::Database;

/// Every model, built over one shared pool
#[derive(Clone)]
pub struct Models {
    pub users: user::UserModel,
    pub marketiers: marketier::MarketierModel,
    pub product_owners: product_owner::ProductOwnerModel,
    pub tokens: Arc<dyn TokenStore>,
    pub products: product::ProductModel,
    pub proposals: proposal::ProposalModel,
    pub contacts: contact::ContactModel,
    pub reviews: review::ReviewModel,
}

impl Models {
    pub fn new(db: Database) -> Self {
        Self {
            users: user::UserModel::new(db.clone()),
            marketiers: marketier::MarketierModel::new(db.clone()),
            product_owners: product_owner::ProductOwnerModel::new(db.clone()),
            tokens: Arc::new(token::PgTokenStore::new(db.clone())),
            products: product::ProductModel::new(db.clone()),
            proposals: proposal::ProposalModel::new(db.clone()),
            contacts: contact::ContactModel::new(db.clone()),
            reviews: review::ReviewModel::new(db),
        }
    }

    /// Swap the token store, e.g. for an in-memory one in tests.
    pub fn with_token_store(mut self, tokens: Arc<dyn TokenStore>) -> Self {
        self.tokens = tokens;
        self
    }
}
