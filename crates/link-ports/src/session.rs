use link_core::{FormParams, OAuth2Error};

/// Session key under which an interrupted authorization request is parked.
pub const RETURN_URI_KEY: &str = "ReturnUri";

/// Per-request session bookkeeping for the "return after login" redirect.
///
/// Synchronous: session implementations hold request-local state.
pub trait SessionStore {
    fn get_return_form(&self) -> Result<Option<FormParams>, OAuth2Error>;
    fn set_return_form(&self, form: &FormParams) -> Result<(), OAuth2Error>;
    fn remove_return_form(&self);
}
