use std::fmt;

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::data::contracts::CharityDonation;
use crate::data::gateway::{ContractGateway, PreparedCall};
use crate::data::types::{DonationRecord, DonationSnapshot};
use crate::error::Result;
use crate::flows::{FlowAction, FlowContract};
use crate::utils::{format_eth, format_timestamp, parse_address, parse_eth_amount};

type Calls = CharityDonation::CharityDonationCalls;

/// Client flow for the charity donation tracker.
#[derive(Debug, Clone, Copy, Default)]
pub struct DonationFlow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DonationAction {
    Donate { amount: String },
    WithdrawAll,
    WithdrawAmount { amount: String },
    UpdateCharityAddress { address: String },
}

impl FlowAction for DonationAction {
    fn kind(&self) -> &'static str {
        match self {
            DonationAction::Donate { .. } => "donate",
            DonationAction::WithdrawAll => "withdraw-all",
            DonationAction::WithdrawAmount { .. } => "withdraw-amount",
            DonationAction::UpdateCharityAddress { .. } => "update-charity-address",
        }
    }
}

#[async_trait]
impl FlowContract for DonationFlow {
    type Interface = Calls;
    type Snapshot = DonationSnapshot;
    type Action = DonationAction;

    fn name(&self) -> &'static str {
        "donation"
    }

    fn privileged_role(&self) -> &'static str {
        "charity"
    }

    async fn privileged_address(&self, gateway: &ContractGateway<Calls>) -> Result<Address> {
        Ok(gateway.read(CharityDonation::charityAddressCall {}).await?._0)
    }

    async fn fetch_snapshot(
        &self,
        gateway: &ContractGateway<Calls>,
        account: Address,
    ) -> Result<DonationSnapshot> {
        let (balance, count, total, contribution, charity, donations) = tokio::try_join!(
            gateway.read(CharityDonation::getContractBalanceCall {}),
            gateway.read(CharityDonation::getTotalDonationsCall {}),
            gateway.read(CharityDonation::totalDonationsCall {}),
            gateway.read(CharityDonation::getDonorContributionCall { _donor: account }),
            gateway.read(CharityDonation::charityAddressCall {}),
            gateway.read(CharityDonation::getAllDonationsCall {}),
        )?;

        Ok(DonationSnapshot {
            contract_balance: balance._0,
            total_donation_count: count._0,
            total_donation_amount: total._0,
            caller_contribution: contribution._0,
            charity_address: charity._0,
            donations: donations._0.into_iter().map(DonationRecord::from).collect(),
        })
    }

    fn prepare(&self, action: &DonationAction) -> Result<PreparedCall<Calls>> {
        let prepared = match action {
            DonationAction::Donate { amount } => PreparedCall::with_value(
                Calls::donate(CharityDonation::donateCall {}),
                parse_eth_amount(amount)?,
            ),
            DonationAction::WithdrawAll => {
                PreparedCall::new(Calls::withdrawFunds(CharityDonation::withdrawFundsCall {}))
            }
            DonationAction::WithdrawAmount { amount } => {
                PreparedCall::new(Calls::withdrawAmount(CharityDonation::withdrawAmountCall {
                    _amount: parse_eth_amount(amount)?,
                }))
            }
            DonationAction::UpdateCharityAddress { address } => PreparedCall::new(
                Calls::updateCharityAddress(CharityDonation::updateCharityAddressCall {
                    _newCharityAddress: parse_address(address)?,
                }),
            ),
        };
        Ok(prepared)
    }
}

impl fmt::Display for DonationSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Charity:            {}", self.charity_address)?;
        writeln!(f, "Contract balance:   {}", format_eth(self.contract_balance))?;
        writeln!(f, "Total donated:      {}", format_eth(self.total_donation_amount))?;
        writeln!(f, "Donations:          {}", self.total_donation_count)?;
        writeln!(f, "Your contribution:  {}", format_eth(self.caller_contribution))?;
        if self.donations.is_empty() {
            write!(f, "No donations yet")
        } else {
            write!(f, "Recent donations:")?;
            for d in self.donations.iter().rev() {
                write!(
                    f,
                    "\n  {}  {:>28}  {}",
                    d.donor,
                    format_eth(d.amount),
                    format_timestamp(d.timestamp)
                )?;
            }
            Ok(())
        }
    }
}
