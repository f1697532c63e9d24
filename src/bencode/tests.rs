use super::*;

#[test]
fn test_decode_byte_string() {
    assert_eq!(decode(b"4:spam").unwrap(), Value::string("spam"));
}

#[test]
fn test_decode_empty_byte_string() {
    assert_eq!(decode(b"0:").unwrap(), Value::Bytes(vec![]));
}

#[test]
fn test_decode_binary_byte_string() {
    let value = decode(b"3:\x00\xff\x13").unwrap();
    assert_eq!(value.as_bytes(), Some(&[0x00, 0xff, 0x13][..]));
    assert_eq!(value.as_str(), None);
}

#[test]
fn test_decode_integer() {
    assert_eq!(decode(b"i3e").unwrap(), Value::integer(3));
    assert_eq!(decode(b"i0e").unwrap(), Value::integer(0));
    assert_eq!(decode(b"i-42e").unwrap(), Value::integer(-42));
    assert_eq!(
        decode(b"i9223372036854775807e").unwrap(),
        Value::integer(i64::MAX)
    );
}

#[test]
fn test_decode_invalid_integers() {
    for input in [&b"ie"[..], b"i-e", b"i-0e", b"i03e", b"i+3e", b"i1x2e"] {
        assert!(
            matches!(decode(input), Err(BencodeError::InvalidInteger { .. })),
            "{:?} should be rejected",
            String::from_utf8_lossy(input)
        );
    }
}

#[test]
fn test_integer_wider_than_64_bits() {
    let input = b"i18446744073709551616e";
    let value = decode(input).unwrap();

    let expected: BigInt = "18446744073709551616".parse().unwrap();
    assert_eq!(value, Value::Integer(expected));
    assert_eq!(encode(&value), input.to_vec());
    assert_eq!(value.as_u64(), None);
    assert_eq!(value.as_i64(), None);

    let negative = decode(b"i-99999999999999999999999e").unwrap();
    assert_eq!(encode(&negative), b"i-99999999999999999999999e".to_vec());
    assert_eq!(negative.as_i64(), None);
}

#[test]
fn test_integer_narrowing() {
    assert_eq!(Value::integer(u64::MAX).as_u64(), Some(u64::MAX));
    assert_eq!(Value::integer(u64::MAX).as_i64(), None);
    assert_eq!(Value::integer(-1).as_u64(), None);
    assert_eq!(Value::integer(-1).as_i64(), Some(-1));
    assert_eq!(Value::string("1").as_u64(), None);
}

#[test]
fn test_decode_list() {
    let value = decode(b"l4:spam4:eggse").unwrap();
    assert_eq!(
        value,
        Value::List(vec![Value::string("spam"), Value::string("eggs")])
    );
}

#[test]
fn test_decode_empty_list_and_dict() {
    assert_eq!(decode(b"le").unwrap(), Value::List(vec![]));
    assert_eq!(decode(b"de").unwrap(), Value::dict(Vec::<(&str, Value)>::new()));
}

#[test]
fn test_decode_dict() {
    let value = decode(b"d3:cow3:moo4:spam4:eggse").unwrap();
    assert_eq!(value.get(b"cow").and_then(Value::as_str), Some("moo"));
    assert_eq!(value.get(b"spam").and_then(Value::as_str), Some("eggs"));
    assert_eq!(value.as_dict().map(|d| d.len()), Some(2));
}

#[test]
fn test_decode_dict_with_empty_value() {
    let value = decode(b"d4:size0:e").unwrap();
    assert_eq!(value.get(b"size"), Some(&Value::Bytes(vec![])));
}

#[test]
fn test_decode_dict_duplicate_key_last_wins() {
    let value = decode(b"d1:ai1e1:ai2ee").unwrap();
    assert_eq!(value.get(b"a"), Some(&Value::integer(2)));
}

#[test]
fn test_decode_dict_non_string_key() {
    assert!(matches!(
        decode(b"di1ei2ee"),
        Err(BencodeError::NonStringKey(1))
    ));
}

#[test]
fn test_decode_string_longer_than_input() {
    assert!(matches!(
        decode(b"10:short"),
        Err(BencodeError::UnexpectedEof(_))
    ));
    assert!(matches!(
        decode(b"18446744073709551615:x"),
        Err(BencodeError::UnexpectedEof(_))
    ));
}

#[test]
fn test_decode_huge_length_is_rejected() {
    assert!(decode(b"99999999999999999999999999:x").is_err());
}

#[test]
fn test_decode_truncated_structures() {
    for input in [&b""[..], b"l", b"li1e", b"d3:cow", b"d3:cow3:moo", b"i12", b"4"] {
        assert!(decode(input).is_err());
    }
}

#[test]
fn test_decode_unexpected_byte() {
    assert_eq!(
        decode(b"x"),
        Err(BencodeError::UnexpectedByte {
            byte: b'x',
            position: 0
        })
    );
}

#[test]
fn test_decode_trailing_data() {
    assert_eq!(decode(b"i1ei2e"), Err(BencodeError::TrailingData(3)));
}

#[test]
fn test_decode_nesting_limit() {
    let mut deep = vec![b'l'; MAX_DEPTH + 2];
    deep.extend(vec![b'e'; MAX_DEPTH + 2]);
    assert_eq!(decode(&deep), Err(BencodeError::NestingTooDeep(MAX_DEPTH)));

    let mut ok = vec![b'l'; MAX_DEPTH];
    ok.extend(vec![b'e'; MAX_DEPTH]);
    assert!(decode(&ok).is_ok());
}

#[test]
fn test_decoder_cursor_stops_after_value() {
    let data = b"4:spami7ele";
    let mut decoder = Decoder::new(data);

    assert_eq!(decoder.decode_next().unwrap(), Value::string("spam"));
    assert_eq!(decoder.position(), 6);
    assert_eq!(decoder.decode_next().unwrap(), Value::integer(7));
    assert_eq!(decoder.position(), 9);
    assert_eq!(decoder.decode_next().unwrap(), Value::List(vec![]));
    assert_eq!(decoder.remaining(), 0);
}

#[test]
fn test_decoder_cursor_unchanged_on_error() {
    let mut decoder = Decoder::new(b"i1el4:spa");
    decoder.decode_next().unwrap();
    assert!(decoder.decode_next().is_err());
    assert_eq!(decoder.position(), 3);
}

#[test]
fn test_encode_scalars() {
    assert_eq!(encode(&Value::integer(42)), b"i42e");
    assert_eq!(encode(&Value::integer(-7)), b"i-7e");
    assert_eq!(encode(&Value::string("spam")), b"4:spam");
    assert_eq!(encode(&Value::Bytes(vec![])), b"0:");
}

#[test]
fn test_encode_sorts_keys() {
    let value = Value::dict(vec![
        ("zebra", Value::integer(1)),
        ("apple", Value::integer(2)),
        ("Mango", Value::integer(3)),
    ]);
    assert_eq!(encode(&value), b"d5:Mangoi3e5:applei2e5:zebrai1ee");
}

#[test]
fn test_round_trip_nested() {
    let value = Value::dict(vec![
        ("announce", Value::string("http://tracker.example.com/announce")),
        (
            "info",
            Value::dict(vec![
                ("length", Value::integer(1i64 << 40)),
                ("name", Value::string("file.iso")),
                ("piece length", Value::integer(262_144)),
                ("pieces", Value::Bytes(vec![0xab; 40])),
            ]),
        ),
        ("list", Value::List(vec![Value::integer(0), Value::List(vec![])])),
    ]);

    assert_eq!(decode(&encode(&value)).unwrap(), value);
}

#[test]
fn test_canonical_input_re_encodes_identically() {
    let raw = b"d6:lengthi1024e4:name8:file.bin12:piece lengthi512e6:pieces40:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaae";
    assert_eq!(encode(&decode(raw).unwrap()), raw.to_vec());
}

#[test]
fn test_find_raw_value() {
    let data = b"d8:announce3:url4:infod4:name1:xe7:comment2:hie";
    assert_eq!(find_raw_value(data, b"info").unwrap(), Some(&b"d4:name1:xe"[..]));
    assert_eq!(find_raw_value(data, b"announce").unwrap(), Some(&b"3:url"[..]));
    assert_eq!(find_raw_value(data, b"missing").unwrap(), None);
}

#[test]
fn test_find_raw_value_preserves_non_canonical_bytes() {
    // Keys out of order inside info: the raw span must not be re-sorted.
    let data = b"d4:infod1:bi1e1:ai2eee";
    let raw = find_raw_value(data, b"info").unwrap().unwrap();
    assert_eq!(raw, b"d1:bi1e1:ai2ee");
    assert_ne!(encode(&decode(raw).unwrap()), raw.to_vec());
}

#[test]
fn test_find_raw_value_not_a_dict() {
    assert_eq!(find_raw_value(b"li1ee", b"info").unwrap(), None);
    assert!(find_raw_value(b"d4:info", b"info").is_err());
}
