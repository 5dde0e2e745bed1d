//! Shared fixtures: an Apache-style listing page and matching file bodies.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use mrms_sync::ListingConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Path of the listing for `date` on the mock server.
pub fn listing_path(date: NaiveDate) -> String {
    format!("/{}/mrms/ncep/MultiSensor_QPE_01H_Pass2", date.format("%Y/%m/%d"))
}

/// Listing configuration pointed at the mock server.
pub fn listing_config(server: &MockServer) -> ListingConfig {
    ListingConfig {
        url_template: format!(
            "{}/{{year:4d}}/{{month:02d}}/{{day:02d}}/mrms/ncep/MultiSensor_QPE_01H_Pass2",
            server.uri()
        ),
        ..ListingConfig::default()
    }
}

pub fn file_name(date: NaiveDate, hour: u32) -> String {
    format!(
        "MultiSensor_QPE_01H_Pass2_00.00_{}-{:02}0000.grib2.gz",
        date.format("%Y%m%d"),
        hour
    )
}

/// Size column text and body length for the file of a given hour.
///
/// Alternates exact byte counts with kilobyte-rounded ones.
pub fn file_size(hour: u32) -> (String, usize) {
    if hour % 2 == 0 {
        let bytes = 700 + hour as usize;
        (bytes.to_string(), bytes)
    } else {
        let kb = 2 + hour as usize;
        (format!("{}K", kb), kb * 1024)
    }
}

pub fn file_body(hour: u32) -> Vec<u8> {
    let (_, len) = file_size(hour);
    vec![b'a' + (hour % 26) as u8; len]
}

/// Listing page for `hours` files, stamped in US Central local time the way
/// the archive shows them. Hourly files are written two minutes after the UTC hour.
pub fn listing_page(date: NaiveDate, hours: u32) -> String {
    let mut page = String::from(
        "<html><head><title>Index</title></head><body><table>\n\
         <tr><th><a href=\"?C=N;O=D\">Name</a></th><th><a href=\"?C=M;O=A\">Last modified</a></th><th><a href=\"?C=S;O=A\">Size</a></th></tr>\n\
         <tr><td><a href=\"/\">Parent Directory</a></td><td>&nbsp;</td><td align=\"right\">  - </td></tr>\n",
    );
    for hour in 0..hours {
        let utc: NaiveDateTime = date.and_hms_opt(hour, 2, 0).unwrap();
        // August in Ames, Iowa is CDT, UTC-5.
        let local = utc - Duration::hours(5);
        let name = file_name(date, hour);
        let (size, _) = file_size(hour);
        page.push_str(&format!(
            "<tr><td><a href=\"{name}\">{name}</a></td><td align=\"right\">{}  </td><td align=\"right\">{size}</td></tr>\n",
            local.format("%Y-%m-%d %H:%M"),
        ));
    }
    page.push_str("</table></body></html>\n");
    page
}

pub async fn mount_listing(server: &MockServer, date: NaiveDate, hours: u32) {
    Mock::given(method("GET"))
        .and(path(listing_path(date)))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(date, hours)))
        .mount(server)
        .await;
}

/// Serves every file of the listing, expecting `times` fetches of each.
pub async fn mount_files(server: &MockServer, date: NaiveDate, hours: u32, times: u64) {
    for hour in 0..hours {
        Mock::given(method("GET"))
            .and(path(format!("{}/{}", listing_path(date), file_name(date, hour))))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(file_body(hour)))
            .expect(times)
            .mount(server)
            .await;
    }
}

/// Serves a single response that promises `advertised` bytes, sends only
/// `sent` of them and then drops the connection. Returns the file URL.
pub async fn serve_cut_off_body(name: &str, advertised: usize, sent: usize) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\n\r\n",
            advertised
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&vec![b'z'; sent]).await.unwrap();
        socket.flush().await.unwrap();
    });
    format!("http://{}/files/{}", addr, name)
}
