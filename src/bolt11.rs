//! Amount extraction from BOLT 11 payment requests.
//!
//! Zap receipts that lack an explicit `amount` tag still carry the original
//! invoice in a `bolt11` tag. The amount lives in the human-readable part
//! before the `1` separator: `ln`, a currency prefix, digits, and an
//! optional multiplier (`m`illi, micro `u`, `n`ano, `p`ico bitcoin). Only
//! that part is parsed here; the data part and its checksum are ignored.

use anyhow::{anyhow, bail, Result};

/// Millisats per whole bitcoin.
const MSAT_PER_BTC: u64 = 100_000_000_000;

/// Extract the invoice amount in millisats.
pub fn amount_msat(invoice: &str) -> Result<u64> {
    let lowered = invoice.trim().to_ascii_lowercase();
    let sep = lowered
        .rfind('1')
        .ok_or_else(|| anyhow!("missing separator"))?;
    let hrp = &lowered[..sep];
    let rest = hrp
        .strip_prefix("ln")
        .ok_or_else(|| anyhow!("not a lightning invoice"))?;
    // Skip the currency prefix (bc, tb, ...) to reach the amount digits.
    let amount_start = rest
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| anyhow!("no amount encoded"))?;
    let amount_part = &rest[amount_start..];
    let (digits, multiplier) = match amount_part.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => {
            let (digits, rest) = amount_part.split_at(idx);
            if rest.len() != 1 {
                bail!("malformed amount: {amount_part}");
            }
            (digits, rest.chars().next())
        }
        None => (amount_part, None),
    };
    let value: u64 = digits.parse()?;
    let msat = match multiplier {
        None => value
            .checked_mul(MSAT_PER_BTC)
            .ok_or_else(|| anyhow!("amount overflow"))?,
        Some('m') => value
            .checked_mul(MSAT_PER_BTC / 1_000)
            .ok_or_else(|| anyhow!("amount overflow"))?,
        Some('u') => value
            .checked_mul(MSAT_PER_BTC / 1_000_000)
            .ok_or_else(|| anyhow!("amount overflow"))?,
        Some('n') => value
            .checked_mul(MSAT_PER_BTC / 1_000_000_000)
            .ok_or_else(|| anyhow!("amount overflow"))?,
        Some('p') => {
            // Pico amounts carry a tenth of a millisat per unit; sub-msat
            // precision is not representable.
            if value % 10 != 0 {
                bail!("sub-millisat amount: {value}p");
            }
            value / 10
        }
        Some(other) => bail!("unknown multiplier: {other}"),
    };
    Ok(msat)
}

/// Extract the invoice amount in whole sats, flooring sub-sat remainders.
pub fn amount_sats(invoice: &str) -> Result<u64> {
    Ok(amount_msat(invoice)? / 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_units() {
        // 2500u = 2_500 * 100_000 msat = 250_000 sats
        assert_eq!(amount_sats("lnbc2500u1pvjluez").unwrap(), 250_000);
        // 20m = 20 * 100_000_000 msat = 2_000_000 sats
        assert_eq!(amount_sats("lnbc20m1pvjluez").unwrap(), 2_000_000);
        // 2500n = 250 sats
        assert_eq!(amount_sats("lnbc2500n1pvjluez").unwrap(), 250);
        // whole-bitcoin amount, no multiplier
        assert_eq!(amount_sats("lnbc11pvjluez").unwrap(), 100_000_000);
    }

    #[test]
    fn pico_amounts_floor_to_sats() {
        // 10p = 1 msat, floors to 0 sats
        assert_eq!(amount_msat("lnbc10p1pvjluez").unwrap(), 1);
        assert_eq!(amount_sats("lnbc10p1pvjluez").unwrap(), 0);
        // 10000p = 1 sat
        assert_eq!(amount_sats("lnbc10000p1pvjluez").unwrap(), 1);
        // sub-msat precision is rejected
        assert!(amount_msat("lnbc11p1pvjluez").is_err());
    }

    #[test]
    fn testnet_prefix_accepted() {
        assert_eq!(amount_sats("lntb2500u1pvjluez").unwrap(), 250_000);
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(amount_sats("LNBC2500U1PVJLUEZ").unwrap(), 250_000);
    }

    #[test]
    fn malformed_invoices_error() {
        assert!(amount_sats("").is_err());
        assert!(amount_sats("notaninvoice").is_err());
        // no amount digits in the hrp
        assert!(amount_sats("lnbc1pvjluez").is_err());
        // unknown multiplier
        assert!(amount_sats("lnbc25x1pvjluez").is_err());
        // trailing junk between digits and separator
        assert!(amount_sats("lnbc25uu1pvjluez").is_err());
    }
}
