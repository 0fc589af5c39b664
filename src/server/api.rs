//! Wire payloads for the coordination endpoints
//!
//! All endpoints speak JSON. Distinguished points travel as hex dumps of
//! their binary fields: 12 bytes of x-prefix and the 22 little-endian
//! distance bytes, exactly as the record codec lays them out.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::dp::codec::DpRecord;
use crate::types::KangType;

/// `POST /api/configure` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureRequest {
    pub start_range: String,
    pub end_range: String,
    pub pubkey: String,
    pub dp_bits: u32,
    pub range_size: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureResponse {
    pub success: bool,
    pub message: String,
}

/// `POST /api/get_work` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetWorkRequest {
    pub client_id: String,
}

/// One assigned search slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkAssignment {
    pub range_id: String,
    pub start_range: String,
    pub end_range: String,
    pub bit_range: u32,
    pub dp_bits: u32,
    pub pubkey: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetWorkResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work: Option<WorkAssignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One distinguished point in submit form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitPoint {
    /// 12-byte x-prefix, hex.
    pub x_coord: String,
    /// 22-byte little-endian signed distance, hex.
    pub distance: String,
    /// 0=TAME, 1=WILD1, 2=WILD2.
    pub kang_type: u8,
}

impl SubmitPoint {
    pub fn from_record(rec: &DpRecord) -> Self {
        SubmitPoint {
            x_coord: hex::encode(rec.x),
            distance: hex::encode(rec.d),
            kang_type: rec.kang.tag(),
        }
    }

    pub fn to_record(&self) -> Result<DpRecord> {
        let x_bytes = hex::decode(&self.x_coord)?;
        let d_bytes = hex::decode(&self.distance)?;
        if x_bytes.len() != 12 || d_bytes.len() != 22 {
            return Err(anyhow!(
                "bad point field lengths: x {} bytes, distance {} bytes",
                x_bytes.len(),
                d_bytes.len()
            ));
        }
        let mut x = [0u8; 12];
        x.copy_from_slice(&x_bytes);
        let mut d = [0u8; 22];
        d.copy_from_slice(&d_bytes);
        Ok(DpRecord::new(x, d, KangType::from_tag(self.kang_type)?))
    }
}

/// `POST /api/submit_points` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub client_id: String,
    pub points: Vec<SubmitPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// `"ok"` or `"solved"`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_processed: Option<usize>,
}

/// `GET /api/status` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub solved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dp_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Scalar320;

    #[test]
    fn submit_point_round_trip() {
        let rec = DpRecord::from_distance(
            [7u8; 12],
            &Scalar320::from_u64(0xDEAD_BEEF),
            KangType::Wild2,
        );
        let point = SubmitPoint::from_record(&rec);
        assert_eq!(point.x_coord.len(), 24);
        assert_eq!(point.distance.len(), 44);
        assert_eq!(point.kang_type, 2);
        assert_eq!(point.to_record().unwrap(), rec);
    }

    #[test]
    fn submit_point_rejects_bad_fields() {
        let bad_len = SubmitPoint {
            x_coord: "aabb".into(),
            distance: "00".repeat(22),
            kang_type: 0,
        };
        assert!(bad_len.to_record().is_err());
        let bad_type = SubmitPoint {
            x_coord: "00".repeat(12),
            distance: "00".repeat(22),
            kang_type: 7,
        };
        assert!(bad_type.to_record().is_err());
    }

    #[test]
    fn payloads_serialize_compactly() {
        let resp = GetWorkResponse {
            success: false,
            work: None,
            message: Some("No work available".into()),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("work"));
        let parsed: GetWorkResponse = serde_json::from_str(&json).unwrap();
        assert!(!parsed.success);

        let status: StatusResponse =
            serde_json::from_str(r#"{"solved":true,"solution":"abc123"}"#).unwrap();
        assert!(status.solved);
        assert_eq!(status.solution.as_deref(), Some("abc123"));
    }
}
