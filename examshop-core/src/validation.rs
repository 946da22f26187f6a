use serde::{Deserialize, Serialize};

pub const MAX_QUANTITY: u32 = 100;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const PHONE_MAX_LENGTH: usize = 20;
const PHONE_MIN_DIGITS: usize = 9;

/// A positive cart quantity. Constructing one is the only way to get a value
/// into the cart, so lines can never hold zero units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if value < 1 {
            return Err(ValidationError::QuantityTooSmall);
        }
        if value > i64::from(MAX_QUANTITY) {
            return Err(ValidationError::QuantityTooLarge { max: MAX_QUANTITY });
        }
        u32::try_from(value)
            .map(Quantity)
            .map_err(|_| ValidationError::QuantityTooLarge { max: MAX_QUANTITY })
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Quantity {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Quantity::new(i64::from(value))
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("This field is required.")]
    Required,
    #[error("Enter a valid email address.")]
    InvalidEmail,
    #[error("Enter a valid phone number.")]
    InvalidPhone,
    #[error("Ensure this value has at most {max} characters.")]
    TooLong { max: usize },
    #[error("Ensure this value is greater than or equal to 1.")]
    QuantityTooSmall,
    #[error("Ensure this value is less than or equal to {max}.")]
    QuantityTooLarge { max: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
    #[serde(flatten)]
    pub error: ValidationError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{} field(s) failed validation", .0.len())]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, error: ValidationError) {
        self.0.push(FieldError {
            field,
            message: error.to_string(),
            error,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

/// Body of an add-to-cart submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartAddForm {
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default, rename = "override")]
    pub override_quantity: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartAddition {
    pub quantity: Quantity,
    pub override_quantity: bool,
}

impl CartAddForm {
    /// A missing quantity means a single unit.
    pub fn validate(&self) -> Result<CartAddition, ValidationErrors> {
        let quantity = match self.quantity {
            None => Quantity::ONE,
            Some(raw) => Quantity::new(raw).map_err(|e| {
                let mut errors = ValidationErrors::default();
                errors.push("quantity", e);
                errors
            })?,
        };

        Ok(CartAddition {
            quantity,
            override_quantity: self.override_quantity,
        })
    }
}

/// Body of a checkout submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactDetails {
    pub email: String,
    pub phone: String,
}

impl CheckoutForm {
    pub fn validate(&self) -> Result<ContactDetails, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let email = self.email.trim();
        let phone = self.phone_number.trim();

        if let Err(e) = check_email(email) {
            errors.push("email", e);
        }
        if let Err(e) = check_phone(phone) {
            errors.push("phone_number", e);
        }

        errors.into_result(|| ContactDetails {
            email: email.to_string(),
            phone: phone.to_string(),
        })
    }
}

fn check_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::Required);
    }
    if email.len() > EMAIL_MAX_LENGTH {
        return Err(ValidationError::TooLong { max: EMAIL_MAX_LENGTH });
    }

    let (local, domain) = email.split_once('@').ok_or(ValidationError::InvalidEmail)?;
    let well_formed = !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace);

    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

fn check_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.is_empty() {
        return Err(ValidationError::Required);
    }
    if phone.chars().count() > PHONE_MAX_LENGTH {
        return Err(ValidationError::TooLong { max: PHONE_MAX_LENGTH });
    }

    let allowed = phone
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || c == ' ' || c == '-' || (i == 0 && c == '+'));
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();

    if allowed && digits >= PHONE_MIN_DIGITS {
        Ok(())
    } else {
        Err(ValidationError::InvalidPhone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_bounds() {
        assert_eq!(Quantity::new(1).unwrap().get(), 1);
        assert_eq!(Quantity::new(0), Err(ValidationError::QuantityTooSmall));
        assert_eq!(Quantity::new(-3), Err(ValidationError::QuantityTooSmall));
        assert_eq!(
            Quantity::new(i64::from(MAX_QUANTITY) + 1),
            Err(ValidationError::QuantityTooLarge { max: MAX_QUANTITY })
        );
    }

    #[test]
    fn test_cart_add_defaults_to_one() {
        let addition = CartAddForm::default().validate().unwrap();
        assert_eq!(addition.quantity, Quantity::ONE);
        assert!(!addition.override_quantity);
    }

    #[test]
    fn test_cart_add_rejects_zero() {
        let form = CartAddForm { quantity: Some(0), override_quantity: true };
        let errors = form.validate().unwrap_err();
        assert!(errors.has("quantity"));
    }

    #[test]
    fn test_cart_add_form_parses_override_flag() {
        let form: CartAddForm = serde_json::from_str(r#"{"quantity": 3, "override": true}"#).unwrap();
        let addition = form.validate().unwrap();
        assert_eq!(addition.quantity.get(), 3);
        assert!(addition.override_quantity);
    }

    #[test]
    fn test_checkout_valid() {
        let form = CheckoutForm {
            email: " buyer@example.com ".to_string(),
            phone_number: "024 123 4567".to_string(),
        };
        let contact = form.validate().unwrap();
        assert_eq!(contact.email, "buyer@example.com");
        assert_eq!(contact.phone, "024 123 4567");
    }

    #[test]
    fn test_checkout_collects_every_field_error() {
        let form = CheckoutForm {
            email: "not-an-email".to_string(),
            phone_number: String::new(),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.has("email"));
        assert!(errors.has("phone_number"));
        assert_eq!(errors.0.len(), 2);
    }

    #[test]
    fn test_phone_rules() {
        assert_eq!(check_phone("+233241234567"), Ok(()));
        assert_eq!(check_phone("12345"), Err(ValidationError::InvalidPhone));
        assert_eq!(check_phone("02412x4567"), Err(ValidationError::InvalidPhone));
        assert_eq!(
            check_phone("012345678901234567890"),
            Err(ValidationError::TooLong { max: PHONE_MAX_LENGTH })
        );
    }

    #[test]
    fn test_email_rules() {
        assert_eq!(check_email("a@b.co"), Ok(()));
        assert_eq!(check_email("a@@b.co"), Err(ValidationError::InvalidEmail));
        assert_eq!(check_email("a@localhost"), Err(ValidationError::InvalidEmail));
        assert_eq!(check_email("a b@c.com"), Err(ValidationError::InvalidEmail));
    }
}
