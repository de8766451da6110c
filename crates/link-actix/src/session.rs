use actix_session::Session;
use link_ports::{SessionStore, RETURN_URI_KEY};

use link_core::{FormParams, OAuth2Error};

/// [`SessionStore`] over the request's actix cookie session.
pub struct ActixSessionStore(pub Session);

impl SessionStore for ActixSessionStore {
    fn get_return_form(&self) -> Result<Option<FormParams>, OAuth2Error> {
        self.0
            .get::<FormParams>(RETURN_URI_KEY)
            .map_err(OAuth2Error::server_error)
    }

    fn set_return_form(&self, form: &FormParams) -> Result<(), OAuth2Error> {
        self.0
            .insert(RETURN_URI_KEY, form)
            .map_err(OAuth2Error::server_error)
    }

    fn remove_return_form(&self) {
        self.0.remove(RETURN_URI_KEY);
    }
}
