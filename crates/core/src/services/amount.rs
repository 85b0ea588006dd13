//! Token amount normalization.
//!
//! Nodes report amounts as integer minor-unit strings. Stored amounts are
//! decimals in main units, obtained by dividing by `10^precision`.

use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::error::{DecodeError, DecodeResult};
use crate::ports::Coin;

/// Chain constants the decoder depends on.
#[derive(Debug, Clone)]
pub struct ChainParams {
    /// Minor-unit denomination of the staking token.
    pub main_denom: String,
    /// Number of decimals between minor and main units.
    pub precision: u32,
    /// Bech32 prefix of account addresses.
    pub address_prefix: String,
    /// Length of an account address string.
    pub address_length: usize,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            main_denom: "uatom".to_string(),
            precision: 6,
            address_prefix: "cosmos".to_string(),
            address_length: 45,
        }
    }
}

impl ChainParams {
    /// Convert a minor-unit quantity to main units.
    pub fn to_main_units(&self, minor: &BigDecimal) -> BigDecimal {
        minor * &BigDecimal::new(1.into(), i64::from(self.precision))
    }

    /// Sum a coin list that must carry a single denomination.
    ///
    /// Returns the raw minor-unit sum and the shared denom. An empty list, or
    /// a sole zero/blank-denom entry, yields zero with no denom.
    pub fn sum_coins(&self, coins: &[Coin]) -> DecodeResult<(BigDecimal, Option<String>)> {
        if coins.is_empty() || (coins.len() == 1 && is_placeholder(&coins[0])?) {
            return Ok((BigDecimal::from(0), None));
        }

        let mut total = BigDecimal::from(0);
        let mut denom: Option<&str> = None;
        for coin in coins {
            match denom {
                None => denom = Some(coin.denom.as_str()),
                Some(first) if first != coin.denom => {
                    return Err(DecodeError::MixedDenoms {
                        first: first.to_string(),
                        second: coin.denom.clone(),
                    });
                }
                Some(_) => {}
            }
            total += parse_quantity(&coin.amount)?;
        }

        Ok((total, denom.map(str::to_string)))
    }

    /// Normalize a coin list expected in the main denomination.
    pub fn main_amount(&self, coins: &[Coin]) -> DecodeResult<BigDecimal> {
        let (total, denom) = self.sum_coins(coins)?;
        match denom {
            Some(denom) if denom != self.main_denom => Err(DecodeError::UnexpectedDenom(denom)),
            _ => Ok(self.to_main_units(&total)),
        }
    }

    /// Normalize a single coin expected in the main denomination.
    pub fn main_coin(&self, coin: &Coin) -> DecodeResult<BigDecimal> {
        self.main_amount(std::slice::from_ref(coin))
    }

    /// Normalize a transfer amount, keeping its currency.
    ///
    /// The main denomination is converted to main units; other denominations
    /// stay in minor units under their own denom.
    pub fn currency_amount(&self, coins: &[Coin]) -> DecodeResult<(BigDecimal, String)> {
        let (total, denom) = self.sum_coins(coins)?;
        match denom {
            Some(denom) if denom != self.main_denom => Ok((total, denom)),
            _ => Ok((self.to_main_units(&total), self.main_denom.clone())),
        }
    }

    /// Parse an event attribute amount such as `"1234uatom"` or
    /// `"10ibc/27A6,1234uatom"`.
    ///
    /// Main-denom coins are summed and converted; an empty value is zero.
    pub fn event_amount(&self, value: &str) -> DecodeResult<BigDecimal> {
        let mut total = BigDecimal::from(0);
        for coin in value.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            let (amount, denom) = split_coin(coin)?;
            if denom.is_empty() || denom == self.main_denom {
                total += amount;
            }
        }
        Ok(self.to_main_units(&total))
    }
}

/// Parse a minor-unit amount string. Blank is zero.
pub fn parse_quantity(amount: &str) -> DecodeResult<BigDecimal> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Ok(BigDecimal::from(0));
    }
    BigDecimal::from_str(amount).map_err(|_| DecodeError::InvalidAmount(amount.to_string()))
}

/// A zero-amount entry or an entry without denom.
fn is_placeholder(coin: &Coin) -> DecodeResult<bool> {
    if coin.denom.trim().is_empty() {
        return Ok(true);
    }
    Ok(parse_quantity(&coin.amount)? == BigDecimal::from(0))
}

/// Split `"1234uatom"` into its number and denom.
fn split_coin(coin: &str) -> DecodeResult<(BigDecimal, &str)> {
    let split = coin
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(coin.len());
    let (number, denom) = coin.split_at(split);
    if number.is_empty() {
        return Err(DecodeError::InvalidAmount(coin.to_string()));
    }
    Ok((parse_quantity(number)?, denom))
}
