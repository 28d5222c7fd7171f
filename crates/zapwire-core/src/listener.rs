//! Message listener port.

use crate::client::ChatClient;
use crate::session::PromotedSession;

/// The downstream consumer of inbound messages.
///
/// Attached exactly once per promoted session, strictly after the promotion
/// protocol has run -- the [`PromotedSession`] capability it receives can
/// only be constructed by the promotion path, so an implementation cannot be
/// wired to a session that never became usable.
pub trait MessageListener<C: ChatClient>: Send + Sync {
    fn attach(
        &self,
        session: &PromotedSession<C>,
    ) -> impl std::future::Future<Output = ()> + Send;
}
