//! Wire Codec Tests
//!
//! Tests for the encoding primitives and message record round trips.

use tetherkv::protocol::wire::{
    bytes_field, expect_end, pack_bits, pack_size, put_bytes, put_uvarint, unpack_bits,
    unpack_size, uvarint,
};
use tetherkv::protocol::{
    CasPutRequest, IdKeyRequest, IdOnly, KeyList, KeysRequest, ListRequest, ListResponse,
    PutRequest, StatEntry, StatResponse,
};

fn keys(items: &[&str]) -> Vec<Vec<u8>> {
    items.iter().map(|s| s.as_bytes().to_vec()).collect()
}

// =============================================================================
// Varint Tests
// =============================================================================

#[test]
fn test_varint_wire_format() {
    // Most significant group first, continuation bit on all but the last.
    let cases: &[(u64, &[u8])] = &[
        (0, &[0x00]),
        (1, &[0x01]),
        (127, &[0x7f]),
        (128, &[0x81, 0x00]),
        (300, &[0x82, 0x2c]),
        (16_384, &[0x81, 0x80, 0x00]),
        (u64::MAX, &[0x81, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f]),
    ];
    for &(value, want) in cases {
        let mut buf = Vec::new();
        put_uvarint(&mut buf, value);
        assert_eq!(buf, want, "encoding of {}", value);

        let (decoded, consumed) = uvarint(&buf).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(consumed, want.len());
    }
}

#[test]
fn test_varint_truncated() {
    let result = uvarint(&[0x82]);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("truncated"));

    assert!(uvarint(&[]).is_err());
}

#[test]
fn test_bytes_field_round_trip() {
    let mut buf = Vec::new();
    put_bytes(&mut buf, b"hello");
    put_bytes(&mut buf, b"");
    put_bytes(&mut buf, b"world");

    let (first, n1) = bytes_field(&buf).unwrap();
    assert_eq!(first, b"hello");
    let (second, n2) = bytes_field(&buf[n1..]).unwrap();
    assert_eq!(second, b"");
    let (third, n3) = bytes_field(&buf[n1 + n2..]).unwrap();
    assert_eq!(third, b"world");
    assert_eq!(n1 + n2 + n3, buf.len());
}

#[test]
fn test_bytes_field_truncated() {
    // Declared length 5, only one byte remaining.
    let result = bytes_field(&[0x05, b'a']);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("truncated"));
}

#[test]
fn test_expect_end_rejects_trailing_bytes() {
    assert!(expect_end(&[1, 2, 3], 3, "message").is_ok());
    let err = expect_end(&[1, 2, 3, 4], 3, "message").unwrap_err();
    assert!(err.to_string().contains("extra data"));
}

// =============================================================================
// Packed Size Tests
// =============================================================================

#[test]
fn test_pack_size_wire_format() {
    // Minimal big-endian; zero is a single zero byte, never empty.
    let cases: &[(u64, &[u8])] = &[
        (0, &[0x00]),
        (1, &[0x01]),
        (255, &[0xff]),
        (256, &[0x01, 0x00]),
        (0xdead, &[0xde, 0xad]),
        (1 << 32, &[0x01, 0x00, 0x00, 0x00, 0x00]),
        (u64::MAX, &[0xff; 8]),
    ];
    for &(value, want) in cases {
        assert_eq!(pack_size(value), want, "encoding of {}", value);
        assert_eq!(unpack_size(want).unwrap(), value);
    }
}

#[test]
fn test_unpack_size_rejects_bad_payloads() {
    assert!(unpack_size(&[]).is_err());
    assert!(unpack_size(&[0; 9]).is_err());
}

// =============================================================================
// Bit Vector Tests
// =============================================================================

#[test]
fn test_pack_bits_wire_format() {
    // Bit i lands in byte i/8 at bit position i%8.
    assert_eq!(pack_bits(&[]), Vec::<u8>::new());
    assert_eq!(pack_bits(&[true]), vec![0x01]);
    assert_eq!(pack_bits(&[true, false, true]), vec![0x05]);
    assert_eq!(
        pack_bits(&[false, false, false, false, false, false, false, false, true]),
        vec![0x00, 0x01]
    );
}

#[test]
fn test_unpack_bits_round_trip() {
    let flags = vec![true, false, true, true, false, false, true, false, true, true];
    let packed = pack_bits(&flags);
    assert_eq!(unpack_bits(&packed, flags.len()).unwrap(), flags);
}

#[test]
fn test_unpack_bits_length_mismatch() {
    assert!(unpack_bits(&[0x00], 9).is_err());
    assert!(unpack_bits(&[0x00, 0x00], 3).is_err());
}

// =============================================================================
// Message Round Trip Tests
// =============================================================================

#[test]
fn test_id_key_request_round_trip() {
    let req = IdKeyRequest {
        id: 5,
        key: b"a key with spaces".to_vec(),
    };
    assert_eq!(IdKeyRequest::decode(&req.encode()).unwrap(), req);

    // Empty key is a valid remainder.
    let empty = IdKeyRequest {
        id: 0,
        key: Vec::new(),
    };
    assert_eq!(IdKeyRequest::decode(&empty.encode()).unwrap(), empty);
}

#[test]
fn test_id_only_round_trip() {
    let req = IdOnly { id: 7 };
    assert_eq!(IdOnly::decode(&req.encode()).unwrap(), req);

    let big = IdOnly { id: u64::MAX };
    assert_eq!(IdOnly::decode(&big.encode()).unwrap(), big);
}

#[test]
fn test_id_only_rejects_trailing_data() {
    let mut encoded = IdOnly { id: 3 }.encode();
    encoded.push(0x00);
    let err = IdOnly::decode(&encoded).unwrap_err();
    assert!(err.to_string().contains("extra data"));
}

#[test]
fn test_put_request_round_trip() {
    let req = PutRequest {
        id: 1,
        key: b"registers".to_vec(),
        data: b"cold war kids".to_vec(),
        replace: true,
    };
    assert_eq!(PutRequest::decode(&req.encode()).unwrap(), req);

    let minimal = PutRequest::default();
    assert_eq!(PutRequest::decode(&minimal.encode()).unwrap(), minimal);
}

#[test]
fn test_put_request_wire_format() {
    let req = PutRequest {
        id: 1,
        key: b"k".to_vec(),
        data: b"v".to_vec(),
        replace: true,
    };
    // [V id][1 replace][V klen][key][rest data]
    assert_eq!(req.encode(), vec![0x01, 0x01, 0x01, b'k', b'v']);
}

#[test]
fn test_put_request_rejects_bad_replace_flag() {
    let err = PutRequest::decode(&[0x01, 0x02, 0x01, b'k']).unwrap_err();
    assert!(err.to_string().contains("replace"));

    // Truncated before the flag.
    assert!(PutRequest::decode(&[0x01]).is_err());
}

#[test]
fn test_list_request_round_trip() {
    let req = ListRequest {
        id: 2,
        start: b"halfway point".to_vec(),
        count: 122,
    };
    assert_eq!(ListRequest::decode(&req.encode()).unwrap(), req);

    let empty = ListRequest::default();
    assert_eq!(ListRequest::decode(&empty.encode()).unwrap(), empty);
}

#[test]
fn test_list_response_round_trip() {
    let rsp = ListResponse {
        keys: keys(&["ankle", "elbow", "shoulder"]),
        next: b"wrist".to_vec(),
    };
    assert_eq!(ListResponse::decode(&rsp.encode()).unwrap(), rsp);

    // No keys, no next: the end-of-keyspace response.
    let done = ListResponse::default();
    assert_eq!(done.encode(), vec![0x00]);
    assert_eq!(ListResponse::decode(&done.encode()).unwrap(), done);
}

#[test]
fn test_list_response_truncated_key() {
    // next = "" followed by a key whose declared length overruns.
    let err = ListResponse::decode(&[0x00, 0x09, b'x']).unwrap_err();
    assert!(err.to_string().contains("key"));
}

#[test]
fn test_cas_put_request_round_trip() {
    let req = CasPutRequest {
        id: 3,
        data: b"all the data that is fit to store".to_vec(),
        prefix: b"blob/".to_vec(),
        suffix: b".v1".to_vec(),
    };
    assert_eq!(CasPutRequest::decode(&req.encode()).unwrap(), req);

    let bare = CasPutRequest {
        id: 3,
        data: b"payload only".to_vec(),
        ..Default::default()
    };
    assert_eq!(CasPutRequest::decode(&bare.encode()).unwrap(), bare);
}

#[test]
fn test_keys_request_round_trip() {
    let req = KeysRequest {
        id: 4,
        keys: keys(&["apple", "pear", "", "plum"]),
    };
    assert_eq!(KeysRequest::decode(&req.encode()).unwrap(), req);

    let none = KeysRequest {
        id: 9,
        keys: Vec::new(),
    };
    assert_eq!(KeysRequest::decode(&none.encode()).unwrap(), none);
}

#[test]
fn test_key_list_round_trip() {
    let list = KeyList {
        keys: keys(&["missing-one", "missing-two"]),
    };
    assert_eq!(KeyList::decode(&list.encode()).unwrap(), list);

    let empty = KeyList::default();
    assert_eq!(empty.encode(), Vec::<u8>::new());
    assert_eq!(KeyList::decode(&[]).unwrap(), empty);
}

#[test]
fn test_stat_response_round_trip() {
    let rsp = StatResponse {
        entries: vec![
            StatEntry {
                key: b"klaatu".to_vec(),
                size: 17,
            },
            StatEntry {
                key: b"barada".to_vec(),
                size: 1951,
            },
            StatEntry {
                key: b"nikto".to_vec(),
                size: 0,
            },
        ],
    };
    assert_eq!(StatResponse::decode(&rsp.encode()).unwrap(), rsp);
}

#[test]
fn test_stat_response_packs_sizes() {
    let rsp = StatResponse {
        entries: vec![StatEntry {
            key: b"z".to_vec(),
            size: 0,
        }],
    };
    // [V klen][key][V slen][packed-size]; zero packs to one zero byte.
    assert_eq!(rsp.encode(), vec![0x01, b'z', 0x01, 0x00]);
}

#[test]
fn test_binary_safe_fields() {
    // Keys and values with NUL bytes, high bytes, and varint-looking bytes.
    let key: Vec<u8> = vec![0x00, 0x80, 0xff, 0x7f, 0x01];
    let data: Vec<u8> = (0..=255).collect();
    let req = PutRequest {
        id: 300,
        key: key.clone(),
        data: data.clone(),
        replace: false,
    };
    let decoded = PutRequest::decode(&req.encode()).unwrap();
    assert_eq!(decoded.key, key);
    assert_eq!(decoded.data, data);
    assert_eq!(decoded.id, 300);
}
