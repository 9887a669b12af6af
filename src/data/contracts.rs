//! Interface bindings for the two deployed contracts.
//!
//! Only the public surface is declared here; the contracts themselves live on
//! chain. Events are part of each interface but nothing in the client consumes
//! them.

use alloy::sol;

sol! {
    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    interface CharityDonation {
        struct Donation {
            address donor;
            uint256 amount;
            uint256 timestamp;
        }

        event DonationReceived(address indexed donor, uint256 amount, uint256 timestamp);
        event FundsWithdrawn(address indexed charity, uint256 amount, uint256 timestamp);

        function donate() external payable;
        function withdrawFunds() external;
        function withdrawAmount(uint256 _amount) external;
        function updateCharityAddress(address _newCharityAddress) external;

        function getContractBalance() external view returns (uint256);
        function getTotalDonations() external view returns (uint256);
        function getAllDonations() external view returns (Donation[] memory);
        function getDonorContribution(address _donor) external view returns (uint256);
        function charityAddress() external view returns (address);
        function totalDonations() external view returns (uint256);
    }
}

sol! {
    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    interface Votify {
        struct Candidate {
            uint256 id;
            string name;
            string description;
            uint256 voteCount;
            bool exists;
        }

        event CandidateAdded(uint256 indexed candidateId, string name);
        event VoteCast(address indexed voter, uint256 indexed candidateId);

        function owner() external view returns (address);
        function candidatesCount() external view returns (uint256);
        function votingOpen() external view returns (bool);

        function addCandidate(string memory _name, string memory _description) external;
        function updateCandidate(uint256 _candidateId, string memory _name, string memory _description) external;
        function removeCandidate(uint256 _candidateId) external;
        function vote(uint256 _candidateId) external;
        function toggleVoting() external;

        function getAllCandidates() external view returns (Candidate[] memory);
        function hasVoted(address _voter) external view returns (bool);
        function getVoterDetails(address _voter) external view returns (bool _hasVoted, uint256 _votedCandidateId);
    }
}
