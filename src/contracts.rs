//! Contract Definitions
//!
//! Solidity interfaces for the deployed MiniAMM pool and its ERC20 tokens,
//! defined with alloy's `sol!` macro. `#[sol(rpc)]` generates instance types
//! that make calls through any alloy Provider.

use alloy::sol;

// ── ERC20 ─────────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
    }
}

// ── MiniAMM ──────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface MiniAMM {
        function tokenA() external view returns (address);
        function tokenB() external view returns (address);
        function bot() external view returns (address);
        function totalSupply() external view returns (uint256);

        function getReserves() external view returns (uint256 reserveA, uint256 reserveB);
        function getFees() external view returns (uint256 feeA, uint256 feeB);
        function getPrice() external view returns (uint256);
        function getAmountOut(uint256 amountIn, bool AtoB) external view returns (uint256);

        function compoundFees() external;
        function rebalance(uint256 amountIn, bool AtoB) external;
        function setBot(address newBot) external;
    }
}
