//! ABI bindings for the lottery contract.
//!
//! Only the functions this client calls are declared. Calldata is produced with
//! `SolCall::abi_encode` and return data decoded with `abi_decode_returns`.

use alloy_sol_types::sol;

sol! {
    function currentRoundId() external view returns (uint256);

    function getRoundInfo(uint256 roundId)
        external
        view
        returns (
            uint256 ticketPrice,
            uint256 endBlock,
            uint256 pot,
            address[] players,
            address winner,
            bool active
        );

    function owner() external view returns (address);

    function feeBps() external view returns (uint16);

    function buyTicket(uint256 roundId) external payable;

    function startRound(uint256 ticketPriceWei, uint256 durationBlocks, string secret) external;

    function revealAndPayout(uint256 roundId, string secret) external;
}
