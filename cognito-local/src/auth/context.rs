//! The dependency bag every auth operation is handed. Bundles the
//! facade and every service the state machine orchestrates into one
//! struct rather than a handful of loose parameters.

use crate::auth::ChallengeStore;
use crate::clock::{Clock, IdSource};
use crate::facade::CognitoFacade;
use crate::messages::MessagesService;
use crate::otp::OtpService;
use crate::tokens::keystore::KeyStore;

pub struct AuthContext<'a> {
    pub facade: &'a CognitoFacade,
    pub keystore: &'a KeyStore,
    pub issuer_base_url: &'a str,
    pub clock: &'a dyn Clock,
    pub ids: &'a dyn IdSource,
    pub otp: &'a dyn OtpService,
    pub messages: &'a MessagesService,
    pub challenges: &'a ChallengeStore,
}
