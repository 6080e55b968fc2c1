//! Basic handle usage: intern contacts, track roster sets, clean up a
//! vanished client's holdings.

use mantle::{DynamicRepo, FixedRepo, HandleSet, HandleType, IntSet};

fn main() {
    // 1. One repository per category, owned by the connection.
    let mut contacts = DynamicRepo::new(HandleType::Contact);
    let lists = FixedRepo::contact_lists();

    // 2. Intern some roster entries. Same string, same handle.
    let alice = contacts.ensure("alice@example.com");
    let bob = contacts.ensure("bob@example.com");
    assert_eq!(contacts.ensure("alice@example.com"), alice);
    contacts.unref_handle(alice); // drop the duplicate reference

    println!(
        "alice = {} ({}), bob = {} ({})",
        alice,
        contacts.inspect(alice).unwrap(),
        bob,
        contacts.inspect(bob).unwrap()
    );

    // 3. A subscribe list membership set, driven by a wire update.
    let subscribe = lists.lookup("subscribe").unwrap();
    println!("list '{}' = handle {}", lists.inspect(subscribe).unwrap(), subscribe);

    let mut members = HandleSet::new(&contacts);
    let mut incoming = IntSet::new();
    incoming.add(alice.get());
    incoming.add(bob.get());

    let delta = members.update(&mut contacts, &incoming);
    println!("added {} members", delta.len());

    // 4. A remote client pins bob while it works with him.
    contacts.client_hold(":1.7", bob).expect("valid hold");

    // 5. The client crashes; the bus reports its name gone.
    let released = contacts.release_all(":1.7").expect("holder existed");
    println!("client :1.7 vanished, released {} handle(s)", released.len());

    // 6. Drain the roster set and show the repository is clean.
    members.clear(&mut contacts);
    contacts.unref_handle(alice);
    contacts.unref_handle(bob);
    println!("live handles: {}", contacts.live_handles());

    let snap = contacts.metrics().snapshot();
    println!(
        "interned {}, reclaimed {}, holds {}, releases {}",
        snap.interned, snap.reclaimed, snap.holds, snap.releases
    );
}
