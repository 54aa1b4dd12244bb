//! A `HarmonyRpcSource` over alloy's mocked transport.

use alloy::{
    providers::{ProviderBuilder, RootProvider},
    transports::mock::Asserter,
};

use crate::providers::HarmonyRpcSource;

/// The provider type behind [`mock_rpc_source`].
pub type MockedProvider = RootProvider;

/// Creates a `HarmonyRpcSource` whose block and trace requests are both
/// answered, in push order, by the returned `Asserter`.
pub fn mock_rpc_source() -> (HarmonyRpcSource<MockedProvider>, Asserter) {
    let asserter = Asserter::new();
    let provider = ProviderBuilder::new()
        .disable_recommended_fillers()
        .connect_mocked_client(asserter.clone());
    (HarmonyRpcSource::new(provider.clone(), provider), asserter)
}
