//! GATT layout of the RF companion peripheral.

use uuid::Uuid;

use crate::transport::DiscoveredService;

/// RF companion primary service.
pub const SVC_RF_COMPANION: Uuid = Uuid::from_u128(0x4ffaac15_2fc8_15a9_7347_5b4ed3a56ca8);

/// Send-RF characteristic: command writes and acknowledgement notifications.
pub const CHR_SEND_RF: Uuid = Uuid::from_u128(0x421a3acb_9a83_f8bd_1c4f_7469e1a15954);

/// Antenna-state characteristic: informational busy/idle notifications.
pub const CHR_ANTENNA_STATE: Uuid = Uuid::from_u128(0x9f5650ee_5756_5b95_5a48_e9764d33f3a0);

/// Characteristics that must be present for a link to be usable.
pub const REQUIRED_CHARACTERISTICS: [Uuid; 2] = [CHR_SEND_RF, CHR_ANTENNA_STATE];

/// Checks that the discovered services expose everything the core needs.
///
/// Returns a description of the first missing capability.
pub fn check_required(services: &[DiscoveredService]) -> Result<(), String> {
    let service = services
        .iter()
        .find(|s| s.uuid == SVC_RF_COMPANION)
        .ok_or_else(|| format!("required service {SVC_RF_COMPANION} not found"))?;

    for chr in REQUIRED_CHARACTERISTICS {
        if !service.characteristics.contains(&chr) {
            return Err(format!("required characteristic {chr} not found"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_text_form() {
        assert_eq!(
            SVC_RF_COMPANION.to_string(),
            "4ffaac15-2fc8-15a9-7347-5b4ed3a56ca8"
        );
        assert_eq!(CHR_SEND_RF.to_string(), "421a3acb-9a83-f8bd-1c4f-7469e1a15954");
        assert_eq!(
            CHR_ANTENNA_STATE.to_string(),
            "9f5650ee-5756-5b95-5a48-e9764d33f3a0"
        );
    }

    #[test]
    fn test_check_required() {
        let complete = vec![DiscoveredService::rf_companion()];
        assert!(check_required(&complete).is_ok());

        assert!(check_required(&[]).unwrap_err().contains("service"));

        let partial = vec![DiscoveredService {
            uuid: SVC_RF_COMPANION,
            characteristics: vec![CHR_SEND_RF],
        }];
        let err = check_required(&partial).unwrap_err();
        assert!(err.contains(&CHR_ANTENNA_STATE.to_string()));
    }
}
