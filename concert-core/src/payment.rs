use chrono::NaiveDate;

use concert_shared::dto::{CardType, CreditCardDto};
use concert_shared::Masked;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq)]
pub struct CreditCard {
    pub card_type: CardType,
    pub name: String,
    pub number: Masked<String>,
    pub expiry_date: NaiveDate,
}

impl CreditCard {
    /// Validates a card registration against `today`.
    pub fn validate(dto: CreditCardDto, today: NaiveDate) -> CoreResult<Self> {
        let name = dto.name.trim().to_string();
        if name.is_empty() {
            return Err(CoreError::ValidationError("card holder name is required".to_string()));
        }

        let number: String = dto
            .number
            .expose()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        if number.is_empty() {
            return Err(CoreError::ValidationError("card number is required".to_string()));
        }
        if !(12..=19).contains(&number.len()) || !number.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::ValidationError("card number must be 12 to 19 digits".to_string()));
        }
        if dto.expiry_date < today {
            return Err(CoreError::ValidationError("card has expired".to_string()));
        }

        Ok(Self {
            card_type: dto.card_type,
            name,
            number: Masked::new(number),
            expiry_date: dto.expiry_date,
        })
    }

    pub fn last_four(&self) -> &str {
        let number = self.number.expose();
        &number[number.len().saturating_sub(4)..]
    }
}
