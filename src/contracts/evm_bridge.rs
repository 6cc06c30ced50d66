//! `wTKN` wrapped-token contract bindings (§4.4.1, §4.5.1).
//!
//! Only the surface this backend actually drives: the `SwapToNative` burn event the
//! EVM Watcher listens for, and the `balanceOf` read the swap-to-wrapped response
//! reports back to the caller. Minting happens client-side against the signed receipt
//! this backend produces (§4.5), so there is no mint/burn call from the backend itself.

use alloy::sol;

sol! {
    #[sol(rpc)]
    contract WrappedToken {
        event SwapToNative(address indexed evm, string native, uint256 amount);

        function balanceOf(address account) external view returns (uint256);
    }
}
