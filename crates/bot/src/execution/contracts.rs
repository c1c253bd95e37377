//! Compile-time ABI definitions for the GMX v1 contracts via Alloy `sol!`.

#![allow(clippy::too_many_arguments)]

use alloy::sol;

// ---------------------------------------------------------------------------
// GMX PositionRouter
// ---------------------------------------------------------------------------

sol! {
    /// Two-step position router: requests are created here and executed by
    /// GMX keepers a few blocks later.
    #[sol(rpc)]
    interface IPositionRouter {
        function createIncreasePosition(
            address[] memory _path,
            address _indexToken,
            uint256 _amountIn,
            uint256 _minOut,
            uint256 _sizeDelta,
            bool _isLong,
            uint256 _acceptablePrice,
            uint256 _executionFee,
            bytes32 _referralCode
        ) external payable returns (bytes32);

        function createDecreasePosition(
            address[] memory _path,
            address _indexToken,
            uint256 _collateralDelta,
            uint256 _sizeDelta,
            bool _isLong,
            address _receiver,
            uint256 _acceptablePrice,
            uint256 _minOut,
            uint256 _executionFee,
            bool _withdrawETH
        ) external payable returns (bytes32);

        function minExecutionFee() external view returns (uint256);
    }
}

// ---------------------------------------------------------------------------
// GMX Reader
// ---------------------------------------------------------------------------

sol! {
    #[sol(rpc)]
    interface IReader {
        /// Flat array, 9 fields per requested position.
        function getPositions(
            address _vault,
            address _account,
            address[] memory _collateralTokens,
            address[] memory _indexTokens,
            bool[] memory _isLong
        ) external view returns (uint256[] memory);

        function getAmountOut(
            address _vault,
            address _tokenIn,
            address _tokenOut,
            uint256 _amountIn
        ) external view returns (uint256, uint256);
    }
}

// ---------------------------------------------------------------------------
// GMX Router
// ---------------------------------------------------------------------------

sol! {
    #[sol(rpc)]
    interface IRouter {
        function swapETHToTokens(
            address[] memory _path,
            uint256 _minOut,
            address _receiver
        ) external payable;
    }
}

// ---------------------------------------------------------------------------
// ERC20
// ---------------------------------------------------------------------------

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
    }
}
