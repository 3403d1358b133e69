//! Frame codec property tests.

use bigdecimal::BigDecimal;
use gavel_proto::{
    AuctionId, ClientId, FrameHeader, NewAuction, ProtoError, Reply, Request, decode_frame,
    encode_frame,
};
use proptest::prelude::*;

fn arb_request() -> impl Strategy<Value = Request> {
    prop_oneof![
        (any::<String>(), 0u32..10_000, 0u32..10_000, any::<u64>()).prop_map(
            |(description, reserve, start, seller)| {
                Request::CreateAuction(NewAuction {
                    description,
                    reserved_price: BigDecimal::from(reserve),
                    starting_price: BigDecimal::from(start),
                    seller_id: ClientId(seller),
                })
            }
        ),
        (any::<i64>(), any::<u64>(), any::<u64>()).prop_map(|(cents, auction, bidder)| {
            Request::PlaceBid {
                price: BigDecimal::new(cents.into(), 2),
                auction_id: AuctionId(auction),
                bidder_id: ClientId(bidder),
            }
        }),
        any::<u64>().prop_map(|id| Request::AnnounceWinner { auction_id: AuctionId(id) }),
        (".{0,32}", any::<u32>())
            .prop_map(|(key_name, challenge)| Request::ServerAuthenticationStep { key_name, challenge }),
        Just(Request::GetActiveAuctions),
    ]
}

proptest! {
    #[test]
    fn decoding_arbitrary_bytes_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_frame::<Request>(&bytes);
        let _ = decode_frame::<Reply>(&bytes);
    }

    #[test]
    fn requests_survive_the_codec(request in arb_request()) {
        let mut buf = Vec::new();
        encode_frame(&request, &mut buf).map_err(|e| TestCaseError::fail(e.to_string()))?;

        let header = FrameHeader::from_bytes(&buf).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(header.payload_len() + FrameHeader::SIZE, buf.len());

        let decoded: Request = decode_frame(&buf).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(decoded, request);
    }

    #[test]
    fn any_prefix_of_a_frame_is_truncated(request in arb_request(), cut in 0usize..64) {
        let mut buf = Vec::new();
        encode_frame(&request, &mut buf).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let cut = cut.min(buf.len() - 1);

        let result = decode_frame::<Request>(&buf[..cut]);
        let is_truncated = matches!(result, Err(ProtoError::Truncated { .. }));
        prop_assert!(is_truncated);
    }
}
