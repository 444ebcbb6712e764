use mesh_codec::envelope::{Direction, Flags, derive_key, open, seal};
use mesh_codec::replay::Window;
use mesh_codec::Error;

#[test]
fn a_full_session_of_out_of_order_delivery_survives_replay_protection() {
    let network_key = [42u8; 32];
    let send_key = derive_key(&network_key, Direction::Outbound);
    let recv_key = derive_key(&network_key, Direction::Outbound);
    let sender = [1u8; 32];

    let mut sealed = Vec::new();
    for counter in 1..=20u64 {
        let mut wire = Vec::new();
        seal(&send_key, Flags::Data, &sender, counter, format!("packet-{counter}").as_bytes(), &mut wire).unwrap();
        sealed.push(wire);
    }

    // Deliver in a shuffled but still recent order.
    let order = [0, 2, 1, 4, 3, 6, 5, 8, 7, 9, 11, 10, 13, 12, 15, 14, 17, 16, 19, 18];

    let mut window = Window::new();
    let mut delivered = 0;
    for &i in &order {
        let opened = open(&recv_key, &sealed[i]).unwrap();
        if window.accept(opened.counter) {
            delivered += 1;
        }
    }

    assert_eq!(delivered, 20, "every counter should be accepted exactly once");

    // Replaying the same packets again must now be fully rejected.
    for &i in &order {
        let opened = open(&recv_key, &sealed[i]).unwrap();
        assert!(!window.accept(opened.counter));
    }
}

#[test]
fn cross_network_keys_never_decrypt_each_others_traffic() {
    let key_a = derive_key(&[1u8; 32], Direction::Outbound);
    let key_b = derive_key(&[2u8; 32], Direction::Outbound);
    let sender = [9u8; 32];

    let mut wire = Vec::new();
    seal(&key_a, Flags::Data, &sender, 1, b"secret", &mut wire).unwrap();

    assert!(matches!(open(&key_b, &wire), Err(Error::AuthFail)));
}
