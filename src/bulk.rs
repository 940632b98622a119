use std::collections::HashSet;

use rand::Rng;

use crate::models::invite::NewInvite;

const CODE_LEN: usize = 12;

pub fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..36u8);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect()
}

/// Produces `count` invites with distinct random codes.
pub fn generate_invites(
    count: usize,
    funding_amount: u64,
    push_amount: u64,
) -> Result<Vec<NewInvite>, String> {
    check_amounts(funding_amount, push_amount)?;

    let mut codes = HashSet::with_capacity(count);
    while codes.len() < count {
        codes.insert(generate_invite_code());
    }

    Ok(codes
        .into_iter()
        .map(|code| NewInvite {
            code,
            funding_amount,
            push_amount,
        })
        .collect())
}

/// Parses `code,funding_amount[,push_amount]` rows. Blank lines are skipped.
pub fn parse_csv(input: &str) -> Result<Vec<NewInvite>, String> {
    let mut invites = Vec::new();

    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let (code, funding, push) = match fields.as_slice() {
            [code, funding] => (*code, *funding, "0"),
            [code, funding, push] => (*code, *funding, *push),
            _ => return Err(format!("line {line_no}: expected 2 or 3 fields, got {}", fields.len())),
        };

        if code.is_empty() {
            return Err(format!("line {line_no}: empty invite code"));
        }
        let funding_amount = parse_amount(funding)
            .ok_or_else(|| format!("line {line_no}: invalid funding amount {funding:?}"))?;
        let push_amount = parse_amount(if push.is_empty() { "0" } else { push })
            .ok_or_else(|| format!("line {line_no}: invalid push amount {push:?}"))?;
        check_amounts(funding_amount, push_amount).map_err(|e| format!("line {line_no}: {e}"))?;

        invites.push(NewInvite {
            code: code.to_string(),
            funding_amount,
            push_amount,
        });
    }

    Ok(invites)
}

/// Amounts are stored as BIGINT, so anything above `i64::MAX` is rejected here.
fn parse_amount(s: &str) -> Option<u64> {
    s.parse::<u64>().ok().filter(|v| i64::try_from(*v).is_ok())
}

fn check_amounts(funding_amount: u64, push_amount: u64) -> Result<(), String> {
    if funding_amount == 0 {
        return Err("funding amount must be positive".into());
    }
    if push_amount > funding_amount {
        return Err("push amount cannot exceed funding amount".into());
    }
    if i64::try_from(funding_amount).is_err() {
        return Err("funding amount is too large".into());
    }
    Ok(())
}
