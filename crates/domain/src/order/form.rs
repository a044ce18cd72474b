use common::{Money, UserId};
use serde::{Deserialize, Serialize};
use store::{DeliveryMethod, ShippingAddress};

use super::OrderError;

/// Address line stored on pickup orders.
pub const PICKUP_ADDRESS: &str = "Store pickup";

/// Customer-supplied checkout data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutForm {
    pub payment_method: String,
    pub delivery_method: DeliveryMethod,
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    pub customer_phone: String,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub shipping_city: Option<String>,
    #[serde(default)]
    pub shipping_region: Option<String>,
    #[serde(default)]
    pub shipping_neighborhood: Option<String>,
    #[serde(default)]
    pub shipping_postal_code: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Overrides the configured shipping fee for delivery orders.
    #[serde(default)]
    pub shipping_cost: Option<Money>,
    #[serde(default)]
    pub tax: Option<Money>,
    #[serde(default)]
    pub discount: Option<Money>,
    /// Account placing the order; guests leave this empty.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl CheckoutForm {
    /// A minimal pickup form.
    pub fn pickup(
        customer_name: impl Into<String>,
        customer_phone: impl Into<String>,
        payment_method: impl Into<String>,
    ) -> Self {
        Self {
            payment_method: payment_method.into(),
            delivery_method: DeliveryMethod::Pickup,
            customer_name: customer_name.into(),
            customer_email: None,
            customer_phone: customer_phone.into(),
            shipping_address: None,
            shipping_city: None,
            shipping_region: None,
            shipping_neighborhood: None,
            shipping_postal_code: None,
            notes: None,
            shipping_cost: None,
            tax: None,
            discount: None,
            user_id: None,
        }
    }

    /// A minimal delivery form.
    pub fn delivery(
        customer_name: impl Into<String>,
        customer_phone: impl Into<String>,
        payment_method: impl Into<String>,
        address: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        Self {
            delivery_method: DeliveryMethod::Delivery,
            shipping_address: Some(address.into()),
            shipping_city: Some(city.into()),
            ..Self::pickup(customer_name, customer_phone, payment_method)
        }
    }

    /// Checks required fields and amounts.
    pub fn validate(&self) -> Result<(), OrderError> {
        require("customer_name", &self.customer_name)?;
        require("customer_phone", &self.customer_phone)?;
        require("payment_method", &self.payment_method)?;

        if self.delivery_method == DeliveryMethod::Delivery {
            require(
                "shipping_address",
                self.shipping_address.as_deref().unwrap_or_default(),
            )?;
        }

        for (field, amount) in [
            ("shipping_cost", self.shipping_cost),
            ("tax", self.tax),
            ("discount", self.discount),
        ] {
            if amount.is_some_and(|a| a.is_negative()) {
                return Err(OrderError::InvalidForm {
                    field,
                    reason: "must not be negative",
                });
            }
        }
        Ok(())
    }

    /// The address stored on the order.
    ///
    /// Pickup orders always carry the pickup marker and the store's city,
    /// whatever the form says.
    pub fn resolved_address(&self, pickup_city: &str) -> ShippingAddress {
        match self.delivery_method {
            DeliveryMethod::Pickup => ShippingAddress {
                address: Some(PICKUP_ADDRESS.to_string()),
                city: Some(pickup_city.to_string()),
                ..Default::default()
            },
            DeliveryMethod::Delivery => ShippingAddress {
                address: trimmed(&self.shipping_address),
                city: trimmed(&self.shipping_city),
                region: trimmed(&self.shipping_region),
                neighborhood: trimmed(&self.shipping_neighborhood),
                postal_code: trimmed(&self.shipping_postal_code),
            },
        }
    }
}

fn require(field: &'static str, value: &str) -> Result<(), OrderError> {
    if value.trim().is_empty() {
        Err(OrderError::InvalidForm {
            field,
            reason: "is required",
        })
    } else {
        Ok(())
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_forms() {
        assert!(CheckoutForm::pickup("Ana", "555", "cash").validate().is_ok());
        assert!(
            CheckoutForm::delivery("Ana", "555", "card", "Calle 1", "Lima")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_required_fields() {
        let form = CheckoutForm::pickup("  ", "555", "cash");
        assert!(matches!(
            form.validate(),
            Err(OrderError::InvalidForm { field: "customer_name", .. })
        ));

        let form = CheckoutForm::pickup("Ana", "", "cash");
        assert!(matches!(
            form.validate(),
            Err(OrderError::InvalidForm { field: "customer_phone", .. })
        ));

        let form = CheckoutForm::pickup("Ana", "555", "");
        assert!(matches!(
            form.validate(),
            Err(OrderError::InvalidForm { field: "payment_method", .. })
        ));
    }

    #[test]
    fn test_delivery_requires_address() {
        let mut form = CheckoutForm::delivery("Ana", "555", "card", "Calle 1", "Lima");
        form.shipping_address = None;
        assert!(matches!(
            form.validate(),
            Err(OrderError::InvalidForm { field: "shipping_address", .. })
        ));
    }

    #[test]
    fn test_negative_amounts_rejected() {
        let mut form = CheckoutForm::pickup("Ana", "555", "cash");
        form.discount = Some(Money::from_cents(-1));
        assert!(matches!(
            form.validate(),
            Err(OrderError::InvalidForm { field: "discount", .. })
        ));
    }

    #[test]
    fn test_pickup_overrides_address() {
        let mut form = CheckoutForm::pickup("Ana", "555", "cash");
        form.shipping_address = Some("Somewhere 5".to_string());
        form.shipping_city = Some("Elsewhere".to_string());
        form.shipping_postal_code = Some("1234".to_string());

        let address = form.resolved_address("Medellín");
        assert_eq!(address.address.as_deref(), Some(PICKUP_ADDRESS));
        assert_eq!(address.city.as_deref(), Some("Medellín"));
        assert_eq!(address.postal_code, None);
    }

    #[test]
    fn test_delivery_address_is_trimmed() {
        let mut form = CheckoutForm::delivery("Ana", "555", "card", " Calle 1 ", "Lima");
        form.shipping_region = Some("   ".to_string());

        let address = form.resolved_address("Store");
        assert_eq!(address.address.as_deref(), Some("Calle 1"));
        assert_eq!(address.region, None);
    }

    #[test]
    fn test_deserialize_minimal_form() {
        let form: CheckoutForm = serde_json::from_str(
            r#"{"payment_method":"cash","delivery_method":"pickup","customer_name":"Ana","customer_phone":"555"}"#,
        )
        .unwrap();
        assert_eq!(form, CheckoutForm::pickup("Ana", "555", "cash"));
    }
}
