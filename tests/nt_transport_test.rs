use rvision::nt::transport::ServerList;
use rvision::nt::{NetworkTableInstance, Value};
use std::time::Duration;

async fn wait_for(nt: &NetworkTableInstance, key: &str, expected: &Value) -> bool {
    for _ in 0..100 {
        if nt.get_value(key).as_ref() == Some(expected) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn values_flow_between_server_and_client() {
    let server = NetworkTableInstance::new();
    server.get_table("Vision").put_number("Frame Rate (fps)", 12.5);
    let addr = server.start_server("127.0.0.1", 0).await.unwrap();

    let client = NetworkTableInstance::new();
    client.start_client(
        ServerList::new(vec!["127.0.0.1".to_string()]),
        addr.port(),
        Duration::from_millis(50),
    );

    // Existing entries arrive as a snapshot on connect.
    assert!(wait_for(&client, "/Vision/Frame Rate (fps)", &Value::Double(12.5)).await);

    client.get_entry("/selector").set_value(Value::Double(1.0));
    assert!(wait_for(&server, "/selector", &Value::Double(1.0)).await);

    server.get_table("Vision").put_number_array("Center Color", &[15.0, 255.0, 255.0]);
    assert!(wait_for(&client, "/Vision/Center Color", &Value::DoubleArray(vec![15.0, 255.0, 255.0])).await);
}
