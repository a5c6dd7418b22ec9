//! Compiled-in contract interfaces.

use alloy::primitives::U256;
use alloy::sol;

sol! {
    /// Mintable ERC-20 test token.
    interface IToken {
        function transfer(address to, uint256 amount) external returns (bool);
        function mint(address to, uint256 amount) external;
        function approve(address spender, uint256 amount) external returns (bool);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
    }

    /// Protocol staking vault.
    interface IStaking {
        function stake(uint256 poolIndex, uint256 amount) external;
        function withdrawAll() external;
    }

    /// Token swap router.
    interface ISwapRouter {
        function swap(address tokenIn, address tokenOut, uint256 amount) external returns (uint256);
    }
}

/// Decode a single `uint256` return value.
pub fn decode_uint(data: &[u8]) -> Option<U256> {
    data.get(..32).and_then(U256::try_from_be_slice)
}
