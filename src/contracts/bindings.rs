//! Generated ABI bindings
//!
//! Each contract lives in its own module so the generated `*Call` types do
//! not collide (both ERC-20 and WETH expose `approve`, for instance).

pub mod erc20 {
    use ethers::prelude::abigen;

    abigen!(
        Erc20,
        r#"[
            function balanceOf(address account) external view returns (uint256)
            function allowance(address owner, address spender) external view returns (uint256)
            function approve(address spender, uint256 amount) external returns (bool)
            function transfer(address to, uint256 amount) external returns (bool)
        ]"#
    );
}

pub mod weth {
    use ethers::prelude::abigen;

    abigen!(
        Weth9,
        r#"[
            function withdraw(uint256 wad) external
        ]"#
    );
}

pub mod flock {
    use ethers::prelude::abigen;

    abigen!(
        FlockDelegate,
        r#"[
            function claimRewards() external
            function delegate(uint256 amount) external
        ]"#
    );

    abigen!(
        GmFlockExchange,
        r#"[
            function exchangeFlock(uint256 flockAmount, uint256 lockPeriod, address beneficiary) external
        ]"#
    );
}

pub mod uniswap {
    use ethers::prelude::abigen;

    abigen!(
        QuoterV2,
        r#"[
            {
                "type": "function",
                "name": "quoteExactInputSingle",
                "stateMutability": "nonpayable",
                "inputs": [
                    {
                        "name": "params",
                        "type": "tuple",
                        "internalType": "struct IQuoterV2.QuoteExactInputSingleParams",
                        "components": [
                            {"name": "tokenIn", "type": "address", "internalType": "address"},
                            {"name": "tokenOut", "type": "address", "internalType": "address"},
                            {"name": "amountIn", "type": "uint256", "internalType": "uint256"},
                            {"name": "fee", "type": "uint24", "internalType": "uint24"},
                            {"name": "sqrtPriceLimitX96", "type": "uint160", "internalType": "uint160"}
                        ]
                    }
                ],
                "outputs": [
                    {"name": "amountOut", "type": "uint256", "internalType": "uint256"},
                    {"name": "sqrtPriceX96After", "type": "uint160", "internalType": "uint160"},
                    {"name": "initializedTicksCrossed", "type": "uint32", "internalType": "uint32"},
                    {"name": "gasEstimate", "type": "uint256", "internalType": "uint256"}
                ]
            }
        ]"#
    );

    abigen!(
        SwapRouter02,
        r#"[
            {
                "type": "function",
                "name": "exactInputSingle",
                "stateMutability": "payable",
                "inputs": [
                    {
                        "name": "params",
                        "type": "tuple",
                        "internalType": "struct IV3SwapRouter.ExactInputSingleParams",
                        "components": [
                            {"name": "tokenIn", "type": "address", "internalType": "address"},
                            {"name": "tokenOut", "type": "address", "internalType": "address"},
                            {"name": "fee", "type": "uint24", "internalType": "uint24"},
                            {"name": "recipient", "type": "address", "internalType": "address"},
                            {"name": "amountIn", "type": "uint256", "internalType": "uint256"},
                            {"name": "amountOutMinimum", "type": "uint256", "internalType": "uint256"},
                            {"name": "sqrtPriceLimitX96", "type": "uint160", "internalType": "uint160"}
                        ]
                    }
                ],
                "outputs": [
                    {"name": "amountOut", "type": "uint256", "internalType": "uint256"}
                ]
            }
        ]"#
    );
}
