mod address;
mod amount;
mod committer;
mod decoder;
mod fetcher;
mod genesis;
mod parser;
mod retry;

pub use address::{AddressScanner, consensus_address, normalize_signer, tx_hash_from_base64};
pub use amount::{ChainParams, parse_quantity};
pub use committer::{CommitterConfig, KnownAddresses, SequencingCommitter};
pub use decoder::{MessageDecoder, MessageKind, parse_vote_option};
pub use fetcher::{FetchConfig, FetchWorkerPool, HeightFetcher};
pub use genesis::{GenesisBootstrapper, GenesisState, derive_state};
pub use parser::{Parser, ParserConfig, ParserHandle};
pub use retry::{RetryPolicy, retry_forever};

use tokio::sync::watch;

/// Resolve once shutdown is signalled or the sender is gone.
pub(crate) async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}
