pub mod evm_bridge;
